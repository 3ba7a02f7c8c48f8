//! Merkle root over a block's transactions.
//!
//! Leaves are transaction ids under a leaf prefix, interior nodes hash
//! their children under a distinct prefix, and an odd node at any level
//! is promoted unchanged. The prefixes prevent a leaf from being
//! reinterpreted as an interior node (or vice versa) by a mutated block.

use crate::transaction::Transaction;
use crate::types::{sha3_256, Hash};

const LEAF_PREFIX: &[u8] = &[0x00];
const NODE_PREFIX: &[u8] = &[0x01];

/// Compute the transactions root committed by a block header.
pub fn merkle_root(transactions: &[Transaction]) -> Hash {
    let leaves: Vec<Hash> = transactions
        .iter()
        .map(|tx| sha3_256(&[LEAF_PREFIX, tx.id().as_bytes()]))
        .collect();
    merkle_root_of_leaves(leaves)
}

fn merkle_root_of_leaves(mut level: Vec<Hash>) -> Hash {
    if level.is_empty() {
        return sha3_256(&[LEAF_PREFIX]);
    }
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [l, r] => next.push(sha3_256(&[NODE_PREFIX, l.as_bytes(), r.as_bytes()])),
                [l] => next.push(*l),
                _ => unreachable!(),
            }
        }
        level = next;
    }
    level[0]
}
