//! Transaction and block introspection opcodes.
//!
//! These are reachable only when the matching context is bound: the
//! transaction family fails with [`VmError::Context`] during bare or
//! block-context execution, and vice versa.

use crate::entry::Entry;
use crate::error::VmError;
use crate::types::Hash;

use super::ops::OP_FAIL;
use super::types::int64_bytes;
use super::Vm;

fn current_input<'t>(vm: &Vm<'t>) -> Result<(&'t crate::transaction::Transaction, &'t Entry, Hash), VmError> {
    let (tx, input_id) = vm.tx_context()?;
    let entry = tx
        .entry(&input_id)
        .ok_or(VmError::MissingEntry(input_id))?;
    Ok((tx, entry, input_id))
}

pub(super) fn op_checkoutput(vm: &mut Vm) -> Result<(), VmError> {
    let (tx, entry, _) = current_input(vm)?;
    vm.apply_cost(16)?;

    let code = vm.pop(true)?;
    let vm_version = vm.pop_int64(true)?;
    if vm_version < 0 {
        return Err(VmError::BadValue);
    }
    let asset_id = vm.pop(true)?;
    let amount = vm.pop_int64(true)?;
    if amount < 0 {
        return Err(VmError::BadValue);
    }
    let refdatahash = vm.pop(true)?;
    let index = vm.pop_int64(true)?;
    if index < 0 {
        return Err(VmError::BadValue);
    }

    let destination = match entry {
        Entry::Spend(sp) => &sp.witness.destination,
        Entry::Issuance(iss) => &iss.witness.destination,
        _ => return Err(VmError::Context),
    };
    let mux = match tx.entry(&destination.ref_id) {
        Some(Entry::Mux(mux)) => mux,
        _ => return vm.push_bool(false, true),
    };
    let dest = match mux.witness.destinations.get(index as usize) {
        Some(dest) => dest,
        None => return vm.push_bool(false, true),
    };

    let field_checks = |res_asset: &[u8; 32], res_amount: u64, res_data: &Hash| -> bool {
        res_asset[..] == asset_id[..]
            && res_amount == amount as u64
            && (refdatahash.is_empty() || refdatahash == res_data.as_bytes())
    };

    if vm_version == 1 && code == [OP_FAIL] {
        // Retirement carve-out: old-style retirements were outputs
        // controlled by the one-byte [FAIL] program. CHECKOUTPUT with
        // that exact code matches a retirement at the position instead.
        return match tx.entry(&dest.ref_id) {
            Some(Entry::Retirement(ret)) => {
                let ok = field_checks(
                    ret.body.source.value.asset_id.as_bytes(),
                    ret.body.source.value.amount,
                    &ret.body.data,
                );
                vm.push_bool(ok, true)
            }
            _ => vm.push_bool(false, true),
        };
    }

    match tx.entry(&dest.ref_id) {
        Some(Entry::Output(out)) => {
            let ok = field_checks(
                out.body.source.value.asset_id.as_bytes(),
                out.body.source.value.amount,
                &out.body.data,
            ) && out.body.control_program.vm_version == vm_version as u64
                && out.body.control_program.code == code;
            vm.push_bool(ok, true)
        }
        _ => vm.push_bool(false, true),
    }
}

pub(super) fn op_asset(vm: &mut Vm) -> Result<(), VmError> {
    let (tx, entry, _) = current_input(vm)?;
    vm.apply_cost(1)?;
    let asset_id = match entry {
        Entry::Spend(sp) => {
            tx.spend_asset_amount(sp)
                .ok_or(VmError::MissingEntry(sp.body.spent_output))?
                .asset_id
        }
        Entry::Issuance(iss) => iss.asset_id(),
        _ => return Err(VmError::Context),
    };
    vm.push(asset_id.as_bytes().to_vec(), true)
}

pub(super) fn op_amount(vm: &mut Vm) -> Result<(), VmError> {
    let (tx, entry, _) = current_input(vm)?;
    vm.apply_cost(1)?;
    let amount = match entry {
        Entry::Spend(sp) => {
            tx.spend_asset_amount(sp)
                .ok_or(VmError::MissingEntry(sp.body.spent_output))?
                .amount
        }
        Entry::Issuance(iss) => iss.amount(),
        _ => return Err(VmError::Context),
    };
    vm.push(int64_bytes(amount as i64), true)
}

pub(super) fn op_program(vm: &mut Vm) -> Result<(), VmError> {
    vm.tx_context()?;
    vm.apply_cost(1)?;
    let mainprog = vm.mainprog.clone();
    vm.push(mainprog, true)
}

pub(super) fn op_mintime(vm: &mut Vm) -> Result<(), VmError> {
    let (tx, _) = vm.tx_context()?;
    vm.apply_cost(1)?;
    vm.push(int64_bytes(tx.min_time_ms() as i64), true)
}

pub(super) fn op_maxtime(vm: &mut Vm) -> Result<(), VmError> {
    let (tx, _) = vm.tx_context()?;
    vm.apply_cost(1)?;
    let mut max_time = tx.max_time_ms();
    // 0 means unbounded; unrepresentable values clamp rather than fail.
    if max_time == 0 || max_time > i64::MAX as u64 {
        max_time = i64::MAX as u64;
    }
    vm.push(int64_bytes(max_time as i64), true)
}

pub(super) fn op_refdatahash(vm: &mut Vm) -> Result<(), VmError> {
    let (_, entry, _) = current_input(vm)?;
    vm.apply_cost(1)?;
    let data = match entry {
        Entry::Spend(sp) => sp.body.data,
        Entry::Issuance(iss) => iss.body.data,
        _ => return Err(VmError::Context),
    };
    vm.push(data.as_bytes().to_vec(), true)
}

pub(super) fn op_txrefdatahash(vm: &mut Vm) -> Result<(), VmError> {
    let (tx, _) = vm.tx_context()?;
    vm.apply_cost(1)?;
    vm.push(tx.data().as_bytes().to_vec(), true)
}

pub(super) fn op_outputid(vm: &mut Vm) -> Result<(), VmError> {
    let (_, entry, _) = current_input(vm)?;
    let spend = match entry {
        Entry::Spend(sp) => sp,
        _ => return Err(VmError::Context),
    };
    vm.apply_cost(1)?;
    vm.push(spend.body.spent_output.as_bytes().to_vec(), true)
}

pub(super) fn op_nonce(vm: &mut Vm) -> Result<(), VmError> {
    let (_, entry, _) = current_input(vm)?;
    let issuance = match entry {
        Entry::Issuance(iss) => iss,
        _ => return Err(VmError::Context),
    };
    vm.apply_cost(1)?;
    vm.push(issuance.body.anchor.as_bytes().to_vec(), true)
}

pub(super) fn op_nextprogram(vm: &mut Vm) -> Result<(), VmError> {
    let header = vm.block_context()?;
    vm.apply_cost(1)?;
    vm.push(header.body.next_consensus_program.clone(), true)
}

pub(super) fn op_blocktime(vm: &mut Vm) -> Result<(), VmError> {
    let header = vm.block_context()?;
    vm.apply_cost(1)?;
    if header.body.timestamp_ms > i64::MAX as u64 {
        return Err(VmError::Range);
    }
    vm.push(int64_bytes(header.body.timestamp_ms as i64), true)
}
