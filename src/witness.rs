//! Witness components: the signature material attached to each input of
//! a template, and the predicate programs signatures commit to.

use crate::entry::Entry;
use crate::error::SigningError;
use crate::transaction::Transaction;
use crate::types::{sha3_256, Hash};
use crate::vm::ops::{
    OP_CHECKOUTPUT, OP_EQUAL, OP_FAIL, OP_GREATERTHANOREQUAL, OP_LESSTHANOREQUAL, OP_MAXTIME,
    OP_MINTIME, OP_OUTPUTID, OP_REFDATAHASH, OP_TRUE, OP_TXREFDATAHASH, OP_TXSIGHASH, OP_VERIFY,
};
use crate::vm::types::int64_bytes;
use crate::vmutil::Builder;

/// Opaque extended public key identity. Key derivation happens in the
/// signer callback; the engine only routes these bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct XPub(pub [u8; 64]);

impl std::fmt::Debug for XPub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "XPub({})", hex::encode(&self.0[..8]))
    }
}

/// A key identity: which xpub, derived how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyId {
    pub xpub: XPub,
    pub derivation_path: Vec<Vec<u8>>,
}

/// Build KeyIds from xpubs sharing one derivation path.
pub fn key_ids(xpubs: &[XPub], path: &[Vec<u8>]) -> Vec<KeyId> {
    xpubs
        .iter()
        .map(|xpub| KeyId {
            xpub: *xpub,
            derivation_path: path.to_vec(),
        })
        .collect()
}

/// Signer callback: produce a 64-byte signature over a 32-byte hash
/// with the named key.
pub type SignerFn<'a> =
    dyn FnMut(&XPub, &[Vec<u8>], &Hash) -> Result<Vec<u8>, String> + 'a;

/// One witness component of a signing instruction. Components are
/// tagged on the wire; unknown tags fail template decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WitnessComponent {
    Signature(SignatureWitness),
}

/// A quorum of signatures over a predicate program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureWitness {
    /// Number of signatures required.
    pub quorum: u32,

    /// Identities of the keys that may sign.
    pub keys: Vec<KeyId>,

    /// The predicate whose hash gets signed. Left empty by the builder
    /// and inferred at first signing from the transaction.
    pub program: Vec<u8>,

    /// Signatures over the program hash, slot-aligned with `keys`.
    pub sigs: Vec<Vec<u8>>,
}

impl SignatureWitness {
    /// Collect signatures from the keys in `xpubs` whose slots are still
    /// empty. Derives the predicate program on first use: a tx-sighash
    /// commitment when further actions are disallowed, a constraint
    /// program otherwise.
    pub fn sign(
        &mut self,
        tx: &Transaction,
        input_id: &Hash,
        allow_additional: bool,
        xpubs: &[XPub],
        signer: &mut SignerFn,
    ) -> Result<(), SigningError> {
        if self.program.is_empty() {
            self.program = build_sig_program(tx, input_id, allow_additional);
            if self.program.is_empty() {
                return Err(SigningError::EmptyProgram);
            }
        }
        if self.sigs.len() < self.keys.len() {
            self.sigs.resize(self.keys.len(), Vec::new());
        }
        let h = sha3_256(&[&self.program]);
        for (i, key_id) in self.keys.iter().enumerate() {
            if !self.sigs[i].is_empty() {
                continue;
            }
            if !xpubs.contains(&key_id.xpub) {
                continue;
            }
            let sig = signer(&key_id.xpub, &key_id.derivation_path, &h).map_err(|detail| {
                SigningError::Signer {
                    key_index: i,
                    detail,
                }
            })?;
            self.sigs[i] = sig;
        }
        Ok(())
    }

    /// Lay this component out into an input's argument vector: the
    /// argument count so far (the `N` for CHECKPREDICATE), then up to
    /// `quorum` present signatures, then the predicate program.
    pub fn materialize(&self, args: &mut Vec<Vec<u8>>) {
        args.push(int64_bytes(args.len() as i64));
        let mut n_sigs = 0;
        for sig in &self.sigs {
            if n_sigs >= self.quorum as usize {
                break;
            }
            if !sig.is_empty() {
                args.push(sig.clone());
                n_sigs += 1;
            }
        }
        args.push(self.program.clone());
    }
}

/// The predicate a signature commits to.
///
/// With `allow_additional` off, the program pins the entire transaction:
/// `PUSH(sighash) TXSIGHASH EQUAL`. Otherwise it ANDs constraints over
/// the parts of the transaction built so far (the time window, the
/// spent output id, reference data, and each result), leaving room for
/// partners to add actions without invalidating the signature.
pub fn build_sig_program(tx: &Transaction, input_id: &Hash, allow_additional: bool) -> Vec<u8> {
    if !allow_additional {
        let sighash = tx.sig_hash(input_id);
        let mut b = Builder::new();
        b.add_data(sighash.as_bytes());
        b.add_op(OP_TXSIGHASH).add_op(OP_EQUAL);
        return b.build();
    }

    let mut constraints: Vec<Vec<u8>> = Vec::new();
    constraints.push(time_constraint(tx.min_time_ms(), tx.max_time_ms()));

    if let Some(Entry::Spend(sp)) = tx.entry(input_id) {
        let mut b = Builder::new();
        b.add_data(sp.body.spent_output.as_bytes());
        b.add_op(OP_OUTPUTID).add_op(OP_EQUAL);
        constraints.push(b.build());
    }

    if !tx.data().is_zero() {
        let mut b = Builder::new();
        b.add_data(tx.data().as_bytes());
        b.add_op(OP_TXREFDATAHASH).add_op(OP_EQUAL);
        constraints.push(b.build());
    }

    let input_data = match tx.entry(input_id) {
        Some(Entry::Spend(sp)) => sp.body.data,
        Some(Entry::Issuance(iss)) => iss.body.data,
        _ => Hash::ZERO,
    };
    if !input_data.is_zero() {
        let mut b = Builder::new();
        b.add_data(input_data.as_bytes());
        b.add_op(OP_REFDATAHASH).add_op(OP_EQUAL);
        constraints.push(b.build());
    }

    for (position, result_id) in tx.results().iter().enumerate() {
        match tx.entry(result_id) {
            Some(Entry::Output(out)) => constraints.push(pay_constraint(
                position as u64,
                out.body.data,
                out.amount(),
                out.asset_id().as_bytes(),
                out.body.control_program.vm_version,
                &out.body.control_program.code,
            )),
            Some(Entry::Retirement(ret)) => constraints.push(pay_constraint(
                position as u64,
                ret.body.data,
                ret.amount(),
                ret.asset_id().as_bytes(),
                1,
                &[OP_FAIL],
            )),
            _ => {}
        }
    }

    let mut program = Vec::new();
    let last = constraints.len() - 1;
    for (i, code) in constraints.iter().enumerate() {
        program.extend_from_slice(code);
        if i < last {
            program.push(OP_VERIFY);
        }
    }
    program
}

/// Commit to the transaction's time window: its min time may only rise
/// and its max time only fall after signing.
fn time_constraint(min_time_ms: u64, max_time_ms: u64) -> Vec<u8> {
    let mut b = Builder::new();
    let mut clauses = 0;
    if min_time_ms > 0 {
        b.add_int64(min_time_ms as i64);
        b.add_op(OP_MINTIME).add_op(OP_LESSTHANOREQUAL);
        clauses += 1;
    }
    if max_time_ms > 0 {
        if clauses > 0 {
            b.add_op(OP_VERIFY);
        }
        b.add_int64(max_time_ms as i64);
        b.add_op(OP_MAXTIME).add_op(OP_GREATERTHANOREQUAL);
        clauses += 1;
    }
    if clauses == 0 {
        b.add_op(OP_TRUE);
    }
    b.build()
}

/// Require a specific result at a specific mux position. Retirements
/// are pinned with the one-byte FAIL program, which CHECKOUTPUT treats
/// as the retirement sentinel.
fn pay_constraint(
    position: u64,
    data: Hash,
    amount: u64,
    asset_id: &[u8; 32],
    vm_version: u64,
    code: &[u8],
) -> Vec<u8> {
    let mut b = Builder::new();
    b.add_int64(position as i64);
    b.add_data(data.as_bytes());
    b.add_int64(amount as i64);
    b.add_data(asset_id);
    b.add_int64(vm_version as i64);
    b.add_data(code);
    b.add_op(OP_CHECKOUTPUT);
    b.build()
}
