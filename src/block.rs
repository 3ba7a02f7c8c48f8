//! Blocks: wire format, header validation, and block application.

use log::{debug, warn};
use rayon::prelude::*;

use crate::entry::BlockHeader;
use crate::error::ValidationError;
use crate::merkle::merkle_root;
use crate::serialization::{write_varint31, ReadError, Reader};
use crate::state::Snapshot;
use crate::transaction::Transaction;
use crate::types::Hash;
use crate::validation::{apply_tx, check_tx_well_formed, confirm_tx};
use crate::vm::{self, assemble::disassemble, CancelToken};
use crate::vmutil;

/// A complete block: header entry plus ordered transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// The block id: the entry id of its header.
    pub fn id(&self) -> Hash {
        self.header.id()
    }

    pub fn version(&self) -> u64 {
        self.header.body.version
    }

    pub fn height(&self) -> u64 {
        self.header.body.height
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.header.body.timestamp_ms
    }

    pub fn previous_block_id(&self) -> Hash {
        self.header.body.previous_block_id
    }

    /// Serialize as `header || varint31(n_tx) || tx…`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.header.body_bytes();
        buf.extend_from_slice(&self.header.witness_bytes());
        write_varint31(&mut buf, self.transactions.len() as u64);
        for tx in &self.transactions {
            buf.extend_from_slice(&tx.to_bytes());
        }
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Block, ReadError> {
        let mut r = Reader::new(data);
        let header = BlockHeader::read(&mut r)?;
        let n = r.read_varint31()?;
        let mut transactions = Vec::with_capacity(n.min(1024) as usize);
        for _ in 0..n {
            transactions.push(Transaction::read_from(&mut r)?);
        }
        if !r.is_empty() {
            return Err(ReadError::TrailingBytes);
        }
        Ok(Block {
            header,
            transactions,
        })
    }

    /// Lowercase hex of the binary wire format, for text-protocol
    /// transport.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(text: &str) -> Result<Block, ReadError> {
        let bytes = hex::decode(text.trim()).map_err(|e| ReadError::Hex(e.to_string()))?;
        Block::from_bytes(&bytes)
    }
}

/// Validate a block header against its predecessor and contents: chain
/// linkage, monotone timestamp, transactions root, and a spendable next
/// consensus program.
pub fn validate_block_header(
    prev: Option<&BlockHeader>,
    block: &Block,
) -> Result<(), ValidationError> {
    match prev {
        None => {
            if block.height() != 1 {
                return Err(ValidationError::BadHeight);
            }
        }
        Some(prev) => {
            if block.previous_block_id() != prev.id() {
                return Err(ValidationError::BadPrevHash);
            }
            if block.height() != prev.body.height + 1 {
                return Err(ValidationError::BadHeight);
            }
            if block.timestamp_ms() < prev.body.timestamp_ms {
                return Err(ValidationError::BadTimestamp);
            }
        }
    }

    if block.header.body.transactions_root != merkle_root(&block.transactions) {
        return Err(ValidationError::BadTxRoot);
    }

    if vmutil::is_unspendable(&block.header.body.next_consensus_program) {
        return Err(ValidationError::BadScript);
    }

    Ok(())
}

/// Validate a block and record its effects in `snapshot`.
///
/// Two halves run concurrently and both must succeed: well-formedness
/// of the transactions fans out across the rayon pool, while a second
/// task performs the header check, the sequential confirm+apply pass,
/// and the final state root comparison. The fan-out only reads
/// transaction bodies; the snapshot is mutated only by the apply
/// steps, in transaction order, so the single writer holds even with
/// both halves in flight. On failure the snapshot may hold partial
/// effects and must be discarded.
pub fn validate_block<S: Snapshot + Send>(
    snapshot: &mut S,
    initial_block_id: &Hash,
    prev: Option<&BlockHeader>,
    block: &Block,
    cancel: Option<&CancelToken>,
) -> Result<(), ValidationError> {
    let (applied, well_formed) = rayon::join(
        || -> Result<(), ValidationError> {
            validate_block_header(prev, block)?;

            snapshot.prune_issuances(block.timestamp_ms());
            for tx in &block.transactions {
                if let Some(token) = cancel {
                    if token.is_cancelled() {
                        return Err(ValidationError::Cancelled);
                    }
                }
                confirm_tx(
                    snapshot,
                    initial_block_id,
                    block.version(),
                    block.timestamp_ms(),
                    tx,
                )?;
                apply_tx(snapshot, tx)?;
            }

            if block.header.body.assets_root != snapshot.root_hash() {
                warn!(
                    "block {} assets root mismatch at height {}",
                    block.id(),
                    block.height()
                );
                return Err(ValidationError::BadStateRoot);
            }
            Ok(())
        },
        || {
            block
                .transactions
                .par_iter()
                .map(|tx| {
                    if let Some(token) = cancel {
                        if token.is_cancelled() {
                            return Err(ValidationError::Cancelled);
                        }
                    }
                    check_tx_well_formed(tx, cancel)
                })
                .collect::<Result<Vec<()>, ValidationError>>()
        },
    );
    applied?;
    well_formed?;

    debug!(
        "validated block {} height {} with {} transaction(s)",
        block.id(),
        block.height(),
        block.transactions.len()
    );
    Ok(())
}

/// The accept-block procedure: evaluate the previous block's consensus
/// program against this block, then validate as usual.
pub fn validate_block_for_accept<S: Snapshot + Send>(
    snapshot: &mut S,
    initial_block_id: &Hash,
    prev: Option<&BlockHeader>,
    block: &Block,
    cancel: Option<&CancelToken>,
) -> Result<(), ValidationError> {
    if let Some(prev) = prev {
        if let Err(err) = vm::verify_block_header(prev, &block.header) {
            let program = disassemble(&prev.body.next_consensus_program);
            let witness: Vec<String> = block
                .header
                .witness
                .arguments
                .iter()
                .map(hex::encode)
                .collect();
            return Err(ValidationError::BadSig {
                detail: format!(
                    "{err}: program [{program}] witness [{}]",
                    witness.join("; ")
                ),
            });
        }
    }
    validate_block(snapshot, initial_block_id, prev, block, cancel)
}

/// Apply a block's transactions to the snapshot without validating.
/// Used when the block has already been validated elsewhere.
pub fn apply_block(snapshot: &mut dyn Snapshot, block: &Block) -> Result<(), ValidationError> {
    snapshot.prune_issuances(block.timestamp_ms());
    for tx in &block.transactions {
        apply_tx(snapshot, tx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::entry::{BlockHeaderBody, BlockHeaderWitness};
    use crate::state::MemSnapshot;
    use crate::types::{AssetAmount, AssetId, Program};
    use crate::vm::ops::OP_TRUE;

    fn issue_tx(tag: u8) -> Transaction {
        let mut b = Builder::new(1, 1_000, 10_000, None);
        let tr = b.add_time_range(900, 20_000);
        let nonce = b.add_nonce(Program::new(1, vec![OP_TRUE]), tr);
        let value = AssetAmount {
            asset_id: AssetId([tag; 32]),
            amount: 10,
        };
        let iss = b.add_issuance(nonce, value, Hash::ZERO);
        b.set_issuance_witness(&iss, Hash::ZERO, Hash::ZERO, Program::new(1, vec![OP_TRUE]));
        b.add_output(value, Program::new(1, vec![OP_TRUE]), Hash::ZERO);
        b.build()
    }

    fn block_at(
        prev: Option<&BlockHeader>,
        timestamp_ms: u64,
        transactions: Vec<Transaction>,
        snapshot_root: Hash,
    ) -> Block {
        let (height, previous_block_id) = match prev {
            Some(prev) => (prev.body.height + 1, prev.id()),
            None => (1, Hash::ZERO),
        };
        Block {
            header: BlockHeader {
                body: BlockHeaderBody {
                    version: 1,
                    height,
                    previous_block_id,
                    timestamp_ms,
                    transactions_root: merkle_root(&transactions),
                    assets_root: snapshot_root,
                    next_consensus_program: vec![OP_TRUE],
                    ext_hash: Hash::ZERO,
                },
                witness: BlockHeaderWitness::default(),
            },
            transactions,
        }
    }

    #[test]
    fn hex_round_trip() {
        let block = block_at(None, 2_000, vec![issue_tx(1)], Hash::ZERO);
        let text = block.to_hex();
        assert_eq!(text, text.to_lowercase());
        let decoded = Block::from_hex(&text).unwrap();
        assert_eq!(decoded.id(), block.id());
        assert_eq!(decoded, block);
    }

    #[test]
    fn validate_block_applies_transactions() {
        let tx = issue_tx(1);
        let output_id = tx.outputs()[0];

        let mut snapshot = MemSnapshot::new();
        let mut expected = MemSnapshot::new();
        expected.insert(&output_id);

        let block = block_at(None, 2_000, vec![tx], expected.root_hash());
        assert_eq!(
            validate_block(&mut snapshot, &Hash::ZERO, None, &block, None),
            Ok(())
        );
        assert!(snapshot.contains(&output_id));
    }

    #[test]
    fn chaining_rules_enforced() {
        let genesis = block_at(None, 1_000, vec![], MemSnapshot::new().root_hash());

        let mut bad_height = block_at(Some(&genesis.header), 2_000, vec![], Hash::ZERO);
        bad_height.header.body.height = 7;
        assert_eq!(
            validate_block_header(Some(&genesis.header), &bad_height),
            Err(ValidationError::BadHeight)
        );

        let mut bad_prev = block_at(Some(&genesis.header), 2_000, vec![], Hash::ZERO);
        bad_prev.header.body.previous_block_id = Hash::ZERO;
        assert_eq!(
            validate_block_header(Some(&genesis.header), &bad_prev),
            Err(ValidationError::BadPrevHash)
        );

        let backwards = block_at(Some(&genesis.header), 500, vec![], Hash::ZERO);
        assert_eq!(
            validate_block_header(Some(&genesis.header), &backwards),
            Err(ValidationError::BadTimestamp)
        );

        let mut bad_root = block_at(Some(&genesis.header), 2_000, vec![], Hash::ZERO);
        bad_root.header.body.transactions_root = Hash::ZERO;
        assert_eq!(
            validate_block_header(Some(&genesis.header), &bad_root),
            Err(ValidationError::BadTxRoot)
        );

        let mut unspendable = block_at(Some(&genesis.header), 2_000, vec![], Hash::ZERO);
        unspendable.header.body.next_consensus_program = vec![crate::vm::ops::OP_FAIL];
        assert_eq!(
            validate_block_header(Some(&genesis.header), &unspendable),
            Err(ValidationError::BadScript)
        );
    }

    #[test]
    fn wrong_state_root_rejected() {
        let tx = issue_tx(1);
        let mut snapshot = MemSnapshot::new();
        let block = block_at(None, 2_000, vec![tx], Hash::ZERO);
        assert_eq!(
            validate_block(&mut snapshot, &Hash::ZERO, None, &block, None),
            Err(ValidationError::BadStateRoot)
        );
    }

    #[test]
    fn accept_runs_consensus_program() {
        let empty_root = MemSnapshot::new();
        let genesis = block_at(None, 1_000, vec![], empty_root.root_hash());

        // Consensus program "ADD 5 NUMEQUAL" over block witness args.
        let mut genesis = genesis;
        genesis.header.body.next_consensus_program =
            crate::vm::assemble::assemble("ADD 5 NUMEQUAL").unwrap();

        let mut next = block_at(Some(&genesis.header), 2_000, vec![], empty_root.root_hash());
        next.header.witness.arguments = vec![vec![2], vec![3]];
        let mut snapshot = MemSnapshot::new();
        assert_eq!(
            validate_block_for_accept(&mut snapshot, &Hash::ZERO, Some(&genesis.header), &next, None),
            Ok(())
        );

        let mut bad = block_at(Some(&genesis.header), 2_000, vec![], empty_root.root_hash());
        bad.header.witness.arguments = vec![vec![2], vec![4]];
        let mut snapshot = MemSnapshot::new();
        assert!(matches!(
            validate_block_for_accept(&mut snapshot, &Hash::ZERO, Some(&genesis.header), &bad, None),
            Err(ValidationError::BadSig { .. })
        ));
    }
}
