//! Finalization: the tx-sighash commitment check and submission.

use log::debug;

use crate::error::SigningError;
use crate::transaction::Transaction;
use crate::types::Hash;
use crate::validation::check_tx_well_formed;
use crate::vm::ops::{OP_DATA_32, OP_EQUAL, OP_TXSIGHASH};

/// Hands a finalized transaction to the network for inclusion in a
/// block.
pub trait Submitter {
    fn submit(&mut self, tx: &Transaction) -> Result<(), SigningError>;
}

/// Validate a signed transaction and submit it.
///
/// Submission must be idempotent, so at least one input has to commit
/// to the complete transaction via the tx-sighash program; resubmitting
/// the identical transaction then cannot be turned into a different
/// one. The well-formedness check runs before submission; a failure
/// there is a rejection, not a signing error.
pub fn finalize_tx<S: Submitter>(submitter: &mut S, tx: &Transaction) -> Result<(), SigningError> {
    check_tx_sighash_commitment(tx)?;
    check_tx_well_formed(tx, None).map_err(SigningError::Rejected)?;
    debug!("submitting transaction {}", tx.id());
    submitter.submit(tx)
}

/// Check that some input's final argument is the canonical 35-byte
/// `PUSH32(sighash) TXSIGHASH EQUAL` program for this transaction.
///
/// Per-input failures escalate: no arguments means signing was never
/// attempted, one or two arguments means it was attempted and failed,
/// anything else is judged on the program shape. One passing input is
/// enough.
pub fn check_tx_sighash_commitment(tx: &Transaction) -> Result<(), SigningError> {
    let mut last_error = SigningError::NoTxSighashAttempt;

    let check = |args: &[Vec<u8>], input_id: &Hash| -> Result<(), SigningError> {
        match args.len() {
            0 => return Err(SigningError::NoTxSighashAttempt),
            1 | 2 => return Err(SigningError::TxSignatureFailure),
            _ => {}
        }
        let program = &args[args.len() - 1];
        if program.len() != 35 {
            return Err(SigningError::NoTxSighashCommitment);
        }
        if program[0] != OP_DATA_32 {
            return Err(SigningError::NoTxSighashCommitment);
        }
        if program[33..] != [OP_TXSIGHASH, OP_EQUAL] {
            return Err(SigningError::NoTxSighashCommitment);
        }
        if program[1..33] != tx.sig_hash(input_id).as_bytes()[..] {
            return Err(SigningError::NoTxSighashCommitment);
        }
        Ok(())
    };

    for input_id in tx.input_ids() {
        let args = tx.arguments(input_id).unwrap_or(&[]);
        match check(args, input_id) {
            Ok(()) => return Ok(()),
            Err(err) => last_error = err,
        }
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::types::{AssetAmount, AssetId, Program};
    use crate::vm::ops::OP_TRUE;
    use crate::vmutil;

    #[derive(Default)]
    struct RecordingSubmitter {
        submitted: Vec<Hash>,
    }

    impl Submitter for RecordingSubmitter {
        fn submit(&mut self, tx: &Transaction) -> Result<(), SigningError> {
            self.submitted.push(tx.id());
            Ok(())
        }
    }

    fn signed_tx() -> Transaction {
        let mut b = Builder::new(1, 0, 0, None);
        let tr = b.add_time_range(1, 10_000);
        let nonce = b.add_nonce(Program::new(1, vec![OP_TRUE]), tr);
        let value = AssetAmount {
            asset_id: AssetId([6; 32]),
            amount: 9,
        };
        let iss = b.add_issuance(nonce, value, Hash::ZERO);
        b.set_issuance_witness(&iss, Hash::ZERO, Hash::ZERO, Program::new(1, vec![OP_TRUE]));
        b.add_output(value, Program::new(1, vec![OP_TRUE]), Hash::ZERO);
        let mut tx = b.build();

        let mut prog = vmutil::Builder::new();
        prog.add_data(tx.sig_hash(&iss).as_bytes());
        prog.add_op(OP_TXSIGHASH).add_op(OP_EQUAL);
        tx.set_arguments(&iss, vec![vec![0], vec![1; 64], prog.build()]);
        tx
    }

    #[test]
    fn commitment_accepted_and_submitted() {
        let tx = signed_tx();
        let mut submitter = RecordingSubmitter::default();
        assert_eq!(finalize_tx(&mut submitter, &tx), Ok(()));
        assert_eq!(submitter.submitted, vec![tx.id()]);
    }

    #[test]
    fn finalize_is_idempotent() {
        let tx = signed_tx();
        let mut submitter = RecordingSubmitter::default();
        assert_eq!(finalize_tx(&mut submitter, &tx), Ok(()));
        assert_eq!(finalize_tx(&mut submitter, &tx), Ok(()));
        assert_eq!(submitter.submitted.len(), 2);
    }

    #[test]
    fn no_arguments_is_no_attempt() {
        let mut b = Builder::new(1, 0, 0, None);
        let tr = b.add_time_range(1, 10_000);
        let nonce = b.add_nonce(Program::new(1, vec![OP_TRUE]), tr);
        let value = AssetAmount {
            asset_id: AssetId([6; 32]),
            amount: 9,
        };
        b.add_issuance(nonce, value, Hash::ZERO);
        let tx = b.build();
        assert_eq!(
            check_tx_sighash_commitment(&tx),
            Err(SigningError::NoTxSighashAttempt)
        );
    }

    #[test]
    fn short_arguments_is_signature_failure() {
        let mut tx = signed_tx();
        let input = tx.issuances()[0];
        tx.set_arguments(&input, vec![vec![1; 64]]);
        assert_eq!(
            check_tx_sighash_commitment(&tx),
            Err(SigningError::TxSignatureFailure)
        );
    }

    #[test]
    fn wrong_sighash_is_no_commitment() {
        let mut tx = signed_tx();
        let input = tx.issuances()[0];
        let mut prog = vmutil::Builder::new();
        prog.add_data(&[9; 32]);
        prog.add_op(OP_TXSIGHASH).add_op(OP_EQUAL);
        tx.set_arguments(&input, vec![vec![0], vec![1; 64], prog.build()]);
        assert_eq!(
            check_tx_sighash_commitment(&tx),
            Err(SigningError::NoTxSighashCommitment)
        );
    }
}
