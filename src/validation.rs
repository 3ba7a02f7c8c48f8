//! Transaction validation: the context-free well-formedness check, the
//! stateful confirmation check, and snapshot application.

use rayon::prelude::*;
use std::collections::HashMap;

use crate::entry::Entry;
use crate::error::{BadTxReason, ValidationError};
use crate::state::Snapshot;
use crate::transaction::Transaction;
use crate::types::{AssetId, Hash, MAX_AMOUNT};
use crate::vm::{self, CancelToken};

fn bad_tx(reason: BadTxReason) -> ValidationError {
    ValidationError::BadTx(reason)
}

/// Context-free well-formedness check.
///
/// Verifies graph bounds, per-asset balance in checked i64 arithmetic,
/// amount bounds, VM versions, and finally runs every input's
/// authorization program. Input programs are independent, so they are
/// fanned out across the rayon pool; the first failure wins.
pub fn check_tx_well_formed(
    tx: &Transaction,
    cancel: Option<&CancelToken>,
) -> Result<(), ValidationError> {
    let n_inputs = tx.spends().len() + tx.issuances().len();
    if n_inputs == 0 {
        return Err(bad_tx(BadTxReason::NoInputs));
    }
    if n_inputs > i32::MAX as usize {
        return Err(bad_tx(BadTxReason::TooManyInputs));
    }
    let n_results = tx.outputs().len() + tx.retirements().len();
    if n_results > i32::MAX as usize {
        return Err(bad_tx(BadTxReason::TooManyOutputs));
    }

    // A transaction whose only inputs are issuances with empty anchors
    // has no replay protection at all.
    let all_empty_nonce_issuances = tx.spends().is_empty()
        && tx.issuances().iter().all(|id| {
            matches!(tx.entry(id), Some(Entry::Issuance(iss)) if iss.body.anchor.is_zero())
        });
    if all_empty_nonce_issuances {
        return Err(bad_tx(BadTxReason::AllEmptyNonceIssuances));
    }

    let max_time_ms = tx.max_time_ms();
    if max_time_ms > 0 && max_time_ms < tx.min_time_ms() {
        return Err(bad_tx(BadTxReason::MisorderedTime));
    }

    check_balance(tx)?;
    check_no_duplicate_sources(tx)?;

    let tx_version = tx.version();
    let input_ids: Vec<Hash> = tx.input_ids().copied().collect();

    for input_id in &input_ids {
        let program = match tx.entry(input_id) {
            Some(Entry::Spend(sp)) => tx
                .spend_control_program(sp)
                .ok_or_else(|| bad_tx(BadTxReason::MissingEntry(sp.body.spent_output)))?
                .clone(),
            Some(Entry::Issuance(iss)) => iss.witness.issuance_program.clone(),
            _ => return Err(bad_tx(BadTxReason::MissingEntry(*input_id))),
        };
        if tx_version == 1 && program.vm_version != 1 {
            return Err(bad_tx(BadTxReason::VmVersion {
                vm_version: program.vm_version,
                input: *input_id,
            }));
        }
    }

    input_ids
        .par_iter()
        .map(|input_id| {
            vm::verify_tx_input(tx, input_id, cancel).map_err(|err| {
                if err == crate::error::VmError::Cancelled {
                    ValidationError::Cancelled
                } else {
                    bad_tx(BadTxReason::ScriptFailure {
                        input: *input_id,
                        source: err,
                    })
                }
            })
        })
        .collect::<Result<Vec<()>, ValidationError>>()?;

    Ok(())
}

/// Per-asset parity: inputs add, results subtract, both in checked i64;
/// every asset must net to exactly zero.
fn check_balance(tx: &Transaction) -> Result<(), ValidationError> {
    let mut parity: HashMap<AssetId, i64> = HashMap::new();

    for spend_id in tx.spends() {
        let spend = tx
            .spend_entry(spend_id)
            .ok_or_else(|| bad_tx(BadTxReason::MissingEntry(*spend_id)))?;
        let value = tx
            .spend_asset_amount(spend)
            .ok_or_else(|| bad_tx(BadTxReason::MissingEntry(spend.body.spent_output)))?;
        if value.amount > MAX_AMOUNT {
            return Err(bad_tx(BadTxReason::InputTooBig));
        }
        let entry = parity.entry(value.asset_id).or_insert(0);
        *entry = entry
            .checked_add(value.amount as i64)
            .ok_or_else(|| bad_tx(BadTxReason::InputSumTooBig { input: *spend_id }))?;
    }

    for iss_id in tx.issuances() {
        let issuance = match tx.entry(iss_id) {
            Some(Entry::Issuance(iss)) => iss,
            _ => return Err(bad_tx(BadTxReason::MissingEntry(*iss_id))),
        };
        if issuance.amount() > MAX_AMOUNT {
            return Err(bad_tx(BadTxReason::InputTooBig));
        }
        let entry = parity.entry(issuance.asset_id()).or_insert(0);
        *entry = entry
            .checked_add(issuance.amount() as i64)
            .ok_or_else(|| bad_tx(BadTxReason::InputSumTooBig { input: *iss_id }))?;
    }

    for result_id in tx.results() {
        let (asset_id, amount) = match tx.entry(result_id) {
            Some(Entry::Output(out)) => {
                if tx.version() == 1 && out.body.control_program.vm_version != 1 {
                    return Err(bad_tx(BadTxReason::VmVersion {
                        vm_version: out.body.control_program.vm_version,
                        input: *result_id,
                    }));
                }
                (out.asset_id(), out.amount())
            }
            Some(Entry::Retirement(ret)) => (ret.asset_id(), ret.amount()),
            _ => return Err(bad_tx(BadTxReason::MissingEntry(*result_id))),
        };
        if amount == 0 {
            return Err(bad_tx(BadTxReason::EmptyOutput));
        }
        if amount > MAX_AMOUNT {
            return Err(bad_tx(BadTxReason::OutputTooBig));
        }
        let entry = parity.entry(asset_id).or_insert(0);
        *entry = entry
            .checked_sub(amount as i64)
            .ok_or_else(|| bad_tx(BadTxReason::OutputSumTooBig { output: *result_id }))?;
    }

    for (asset_id, net) in parity {
        if net != 0 {
            return Err(bad_tx(BadTxReason::UnbalancedV1 { asset: asset_id }));
        }
    }
    Ok(())
}

/// The same input id listed as two mux sources would double-count its
/// value while the entry graph stores it once.
fn check_no_duplicate_sources(tx: &Transaction) -> Result<(), ValidationError> {
    let mux = tx.entries().find_map(|(_, e)| match e {
        Entry::Mux(m) => Some(m),
        _ => None,
    });
    if let Some(mux) = mux {
        let mut seen = std::collections::HashSet::new();
        for source in &mux.body.sources {
            if !seen.insert(source.ref_id) {
                return Err(bad_tx(BadTxReason::DuplicateInput {
                    input: source.ref_id,
                }));
            }
        }
    }
    Ok(())
}

/// Stateful confirmation against a live snapshot, before a transaction
/// is applied at `block_timestamp_ms`.
///
/// The transaction must already have passed [`check_tx_well_formed`].
pub fn confirm_tx(
    snapshot: &dyn Snapshot,
    initial_block_id: &Hash,
    block_version: u64,
    block_timestamp_ms: u64,
    tx: &Transaction,
) -> Result<(), ValidationError> {
    let version = tx.version();
    if version < 1 || version > block_version {
        return Err(bad_tx(BadTxReason::TxVersion {
            version,
            block_version,
        }));
    }

    if block_timestamp_ms < tx.min_time_ms() {
        return Err(bad_tx(BadTxReason::NotYet));
    }
    if tx.max_time_ms() > 0 && block_timestamp_ms > tx.max_time_ms() {
        return Err(bad_tx(BadTxReason::TooLate));
    }

    for iss_id in tx.issuances() {
        let issuance = match tx.entry(iss_id) {
            Some(Entry::Issuance(iss)) => iss,
            _ => return Err(bad_tx(BadTxReason::MissingEntry(*iss_id))),
        };
        if issuance.witness.initial_block_id != *initial_block_id {
            return Err(bad_tx(BadTxReason::WrongBlockchain));
        }
        if issuance.body.anchor.is_zero() {
            continue;
        }
        // An anchor that is not a nonce with a two-sided time range
        // cannot bracket any block timestamp.
        let time_range = match tx.entry(&issuance.body.anchor) {
            Some(Entry::Nonce(nonce)) => match tx.entry(&nonce.body.time_range) {
                Some(Entry::TimeRange(tr)) => tr,
                _ => return Err(bad_tx(BadTxReason::TimelessIssuance)),
            },
            _ => return Err(bad_tx(BadTxReason::TimelessIssuance)),
        };
        if time_range.body.min_time_ms == 0 || time_range.body.max_time_ms == 0 {
            return Err(bad_tx(BadTxReason::TimelessIssuance));
        }
        if block_timestamp_ms < time_range.body.min_time_ms
            || block_timestamp_ms > time_range.body.max_time_ms
        {
            return Err(bad_tx(BadTxReason::IssuanceTime));
        }
        if snapshot.contains_issuance(iss_id) {
            return Err(bad_tx(BadTxReason::DuplicateIssuance));
        }
    }

    for spend_id in tx.spends() {
        let spend = tx
            .spend_entry(spend_id)
            .ok_or_else(|| bad_tx(BadTxReason::MissingEntry(*spend_id)))?;
        if !snapshot.contains(&spend.body.spent_output) {
            return Err(bad_tx(BadTxReason::InvalidOutput {
                output: spend.body.spent_output,
                input: *spend_id,
            }));
        }
    }

    Ok(())
}

/// Apply a confirmed transaction: remember issuances until their anchor
/// window expires, delete spent outputs, insert new ones. Retirements
/// touch nothing.
pub fn apply_tx(snapshot: &mut dyn Snapshot, tx: &Transaction) -> Result<(), ValidationError> {
    for iss_id in tx.issuances() {
        let issuance = match tx.entry(iss_id) {
            Some(Entry::Issuance(iss)) => iss,
            _ => return Err(bad_tx(BadTxReason::MissingEntry(*iss_id))),
        };
        if issuance.body.anchor.is_zero() {
            continue;
        }
        let expiry_ms = match tx.entry(&issuance.body.anchor) {
            Some(Entry::Nonce(nonce)) => match tx.entry(&nonce.body.time_range) {
                Some(Entry::TimeRange(tr)) => tr.body.max_time_ms,
                _ => return Err(bad_tx(BadTxReason::TimelessIssuance)),
            },
            _ => return Err(bad_tx(BadTxReason::TimelessIssuance)),
        };
        snapshot.remember_issuance(*iss_id, expiry_ms);
    }

    for spend_id in tx.spends() {
        let spend = tx
            .spend_entry(spend_id)
            .ok_or_else(|| bad_tx(BadTxReason::MissingEntry(*spend_id)))?;
        snapshot.delete(&spend.body.spent_output);
    }

    for output_id in tx.outputs() {
        snapshot.insert(output_id);
    }

    Ok(())
}
