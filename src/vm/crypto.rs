//! Hashing, signature, and predicate opcodes.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::error::VmError;
use crate::types::sha3_256;

use super::Vm;

pub(super) fn op_sha3(vm: &mut Vm) -> Result<(), VmError> {
    let input = vm.pop(false)?;
    let cost = (input.len() as i64).max(64);
    vm.apply_cost(cost)?;
    vm.push(sha3_256(&[&input]).as_bytes().to_vec(), false)
}

fn verify_ed25519(pubkey: &[u8], msg: &[u8], sig: &[u8]) -> bool {
    let Ok(key_bytes) = <&[u8; 32]>::try_from(pubkey) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = <&[u8; 64]>::try_from(sig) else {
        return false;
    };
    key.verify(msg, &Signature::from_bytes(sig_bytes)).is_ok()
}

pub(super) fn op_checksig(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1024)?;
    let pubkey = vm.pop(true)?;
    let msg = vm.pop(true)?;
    let sig = vm.pop(true)?;
    if msg.len() != 32 {
        return Err(VmError::BadValue);
    }
    vm.push_bool(verify_ed25519(&pubkey, &msg, &sig), true)
}

pub(super) fn op_checkmultisig(vm: &mut Vm) -> Result<(), VmError> {
    let num_pubkeys = vm.pop_int64(true)?;
    if num_pubkeys < 1 {
        return Err(VmError::BadValue);
    }
    let cost = num_pubkeys.checked_mul(1024).ok_or(VmError::Range)?;
    vm.apply_cost(cost)?;
    let quorum = vm.pop_int64(true)?;
    if quorum < 1 || quorum > num_pubkeys {
        return Err(VmError::BadValue);
    }
    let mut pubkeys = Vec::with_capacity(num_pubkeys as usize);
    for _ in 0..num_pubkeys {
        pubkeys.push(vm.pop(true)?);
    }
    let msg = vm.pop(true)?;
    if msg.len() != 32 {
        return Err(VmError::BadValue);
    }
    let mut sigs = Vec::with_capacity(quorum as usize);
    for _ in 0..quorum {
        sigs.push(vm.pop(true)?);
    }

    // Each signature must match a pubkey at or after the previous
    // match; keys failing a comparison are never revisited.
    let mut key_idx = 0;
    let mut matched = 0;
    for sig in &sigs {
        while key_idx < pubkeys.len() {
            if verify_ed25519(&pubkeys[key_idx], &msg, sig) {
                matched += 1;
                key_idx += 1;
                break;
            }
            key_idx += 1;
        }
    }
    vm.push_bool(matched == sigs.len(), true)
}

pub(super) fn op_txsighash(vm: &mut Vm) -> Result<(), VmError> {
    let (tx, input_id) = vm.tx_context()?;
    vm.apply_cost(256)?;
    let hash = tx.sig_hash(&input_id);
    vm.push(hash.as_bytes().to_vec(), false)
}

pub(super) fn op_checkpredicate(vm: &mut Vm) -> Result<(), VmError> {
    if let Some(token) = vm.cancel {
        if token.is_cancelled() {
            return Err(VmError::Cancelled);
        }
    }

    vm.apply_cost(256)?;
    vm.defer_cost(-256 + 64);

    let mut limit = vm.pop_int64(true)?;
    let predicate = vm.pop(true)?;
    let n = vm.pop_int64(true)?;
    if limit < 0 || n < 0 {
        return Err(VmError::BadValue);
    }
    let stack_len = vm.data_stack.len();
    if n as usize > stack_len {
        return Err(VmError::DataStackUnderflow);
    }
    if limit == 0 {
        limit = vm.run_limit;
    }
    vm.apply_cost(limit)?;

    let child_stack = vm.data_stack.drain(stack_len - n as usize..).collect();
    let mut child = Vm {
        program: predicate,
        pc: 0,
        next_pc: 0,
        run_limit: limit,
        deferred_cost: 0,
        data: Vec::new(),
        depth: vm.depth + 1,
        data_stack: child_stack,
        alt_stack: Default::default(),
        control_stack: Vec::new(),
        context: vm.context,
        mainprog: vm.mainprog.clone(),
        cancel: vm.cancel,
    };
    let result = matches!(child.run(), Ok(true));

    // Give back the child's unspent budget and the cost of whatever it
    // left on its stacks.
    vm.defer_cost(-child.run_limit);
    for item in child.data_stack.iter().chain(child.alt_stack.iter()) {
        vm.defer_cost(-Vm::stack_cost(item));
    }
    vm.push_bool(result, true)
}

#[cfg(test)]
mod tests {
    use super::super::ops::*;
    use super::super::{eval, Vm, INITIAL_RUN_LIMIT};
    use super::*;
    use crate::types::sha3_256;
    use crate::vmutil::Builder;

    #[test]
    fn sha3_hashes_top_item() {
        let mut b = Builder::new();
        b.add_data(b"abc").add_op(OP_SHA3);
        b.add_data(sha3_256(&[b"abc"]).as_bytes());
        b.add_op(OP_EQUAL);
        assert_eq!(eval(&b.build(), &[], INITIAL_RUN_LIMIT), Ok(true));
    }

    #[test]
    fn checkpredicate_runs_child_over_top_n() {
        // Child predicate: ADD 5 NUMEQUAL, fed [2, 3].
        let mut pred = Builder::new();
        pred.add_op(OP_ADD).add_int64(5).add_op(OP_NUMEQUAL);

        let mut b = Builder::new();
        b.add_int64(2).add_int64(3);
        b.add_int64(2); // n
        b.add_data(&pred.build());
        b.add_int64(0); // limit: all remaining
        b.add_op(OP_CHECKPREDICATE);
        assert_eq!(eval(&b.build(), &[], INITIAL_RUN_LIMIT), Ok(true));
    }

    #[test]
    fn checkpredicate_failure_pushes_false() {
        let mut pred = Builder::new();
        pred.add_op(OP_FAIL);

        let mut b = Builder::new();
        b.add_int64(0);
        b.add_data(&pred.build());
        b.add_int64(0);
        b.add_op(OP_CHECKPREDICATE);
        assert_eq!(eval(&b.build(), &[], INITIAL_RUN_LIMIT), Ok(false));
    }

    #[test]
    fn checkpredicate_child_cannot_see_below_n() {
        // Parent stack holds a secret below the N window; the child
        // sees only its own (empty) stack and underflows.
        let mut pred = Builder::new();
        pred.add_op(OP_DROP).add_op(OP_TRUE);

        let mut b = Builder::new();
        b.add_data(b"secret");
        b.add_int64(0); // n = 0: child gets nothing
        b.add_data(&pred.build());
        b.add_int64(0);
        b.add_op(OP_CHECKPREDICATE);
        assert_eq!(eval(&b.build(), &[], INITIAL_RUN_LIMIT), Ok(false));
    }

    #[test]
    fn checkpredicate_refunds_unspent_child_limit() {
        let mut pred = Builder::new();
        pred.add_op(OP_TRUE);

        let mut b = Builder::new();
        b.add_int64(0);
        b.add_data(&pred.build());
        b.add_int64(1_000); // explicit child limit
        b.add_op(OP_CHECKPREDICATE);
        let mut vm = Vm::new(b.build(), INITIAL_RUN_LIMIT);
        assert_eq!(vm.run(), Ok(true));
        // Far less than the 1000 carved out should be gone for good.
        assert!(vm.remaining_run_limit() > INITIAL_RUN_LIMIT - 500);
    }

    #[test]
    fn checksig_rejects_malformed_message() {
        let mut b = Builder::new();
        b.add_data(&[1; 64]); // sig
        b.add_data(b"short"); // msg: not 32 bytes
        b.add_data(&[2; 32]); // pubkey
        b.add_op(OP_CHECKSIG);
        assert_eq!(
            eval(&b.build(), &[], INITIAL_RUN_LIMIT),
            Err(crate::error::VmError::BadValue)
        );
    }

    #[test]
    fn checksig_garbage_signature_is_false() {
        let mut b = Builder::new();
        b.add_data(&[1; 64]);
        b.add_data(&[3; 32]);
        b.add_data(&[2; 32]);
        b.add_op(OP_CHECKSIG);
        assert_eq!(eval(&b.build(), &[], INITIAL_RUN_LIMIT), Ok(false));
    }
}
