//! Helpers for constructing VM programs.

use crate::error::VmError;
use crate::vm::ops::{
    OP_0, OP_1NEGATE, OP_CHECKMULTISIG, OP_CHECKPREDICATE, OP_DATA_75, OP_DUP, OP_FAIL,
    OP_FROMALTSTACK, OP_N_BASE, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4, OP_SHA3, OP_TOALTSTACK,
    OP_VERIFY,
};
use crate::vm::types::int64_bytes;

/// Incremental program builder with minimal-encoding pushes.
#[derive(Debug, Default, Clone)]
pub struct Builder {
    program: Vec<u8>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    pub fn add_op(&mut self, op: u8) -> &mut Builder {
        self.program.push(op);
        self
    }

    /// Push a byte string using the shortest encoding: OP_0 for empty,
    /// small-integer opcodes where they coincide, direct pushes up to 75
    /// bytes, then the PUSHDATA family.
    pub fn add_data(&mut self, data: &[u8]) -> &mut Builder {
        match data.len() {
            0 => {
                self.program.push(OP_0);
            }
            1 if (1..=16).contains(&data[0]) => {
                self.program.push(OP_N_BASE + data[0]);
            }
            len if len <= OP_DATA_75 as usize => {
                self.program.push(len as u8);
                self.program.extend_from_slice(data);
            }
            len if len <= u8::MAX as usize => {
                self.program.push(OP_PUSHDATA1);
                self.program.push(len as u8);
                self.program.extend_from_slice(data);
            }
            len if len <= u16::MAX as usize => {
                self.program.push(OP_PUSHDATA2);
                self.program.extend_from_slice(&(len as u16).to_le_bytes());
                self.program.extend_from_slice(data);
            }
            len => {
                self.program.push(OP_PUSHDATA4);
                self.program.extend_from_slice(&(len as u32).to_le_bytes());
                self.program.extend_from_slice(data);
            }
        }
        self
    }

    /// Push an int64 in its canonical stack encoding.
    pub fn add_int64(&mut self, n: i64) -> &mut Builder {
        if n == -1 {
            self.program.push(OP_1NEGATE);
            self
        } else {
            self.add_data(&int64_bytes(n))
        }
    }

    /// Splice raw, pre-encoded program bytes.
    pub fn add_raw_bytes(&mut self, bytes: &[u8]) -> &mut Builder {
        self.program.extend_from_slice(bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.program.clone()
    }
}

/// A statically unspendable program: empty, or one that fails before
/// doing anything else.
pub fn is_unspendable(program: &[u8]) -> bool {
    program.is_empty() || program[0] == OP_FAIL
}

/// The pay-to-signature-program multisig template.
///
/// Expects the materialized witness layout `[n, sigs…, predicate]` on
/// the stack: it hashes the predicate, checks a quorum of signatures
/// over that hash against the fixed keys, then runs the predicate over
/// the caller's first `n` arguments via CHECKPREDICATE.
pub fn p2sp_multisig_program(pubkeys: &[[u8; 32]], quorum: u32) -> Result<Vec<u8>, VmError> {
    if pubkeys.is_empty() || quorum == 0 || quorum as usize > pubkeys.len() {
        return Err(VmError::BadValue);
    }
    let mut b = Builder::new();
    b.add_op(OP_DUP).add_op(OP_TOALTSTACK).add_op(OP_SHA3);
    for pubkey in pubkeys {
        b.add_data(pubkey);
    }
    b.add_int64(quorum as i64);
    b.add_int64(pubkeys.len() as i64);
    b.add_op(OP_CHECKMULTISIG).add_op(OP_VERIFY);
    b.add_op(OP_FROMALTSTACK);
    b.add_int64(0);
    b.add_op(OP_CHECKPREDICATE);
    Ok(b.build())
}
