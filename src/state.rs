//! Ledger state consumed by stateful validation.
//!
//! The real state tree lives outside this crate; validation only needs
//! the [`Snapshot`] contract: membership of unspent output ids, an
//! append-only root hash, and the issuance anti-replay memory.
//! [`MemSnapshot`] is an in-memory reference implementation used by
//! tests and by callers without a persistent tree.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{sha3_256, Hash};

/// The UTXO set plus issuance memory.
///
/// During block application the snapshot is exclusively owned by the
/// validator: ConfirmTx reads it, ApplyTx is the single writer. Callers
/// wanting a side-effect-free check should pass a copy.
pub trait Snapshot {
    /// Whether `id` names an unspent output.
    fn contains(&self, id: &Hash) -> bool;

    /// Record a new unspent output.
    fn insert(&mut self, id: &Hash);

    /// Remove a spent output.
    fn delete(&mut self, id: &Hash);

    /// Root hash over the unspent output set.
    fn root_hash(&self) -> Hash;

    /// Whether an issuance id is already remembered.
    fn contains_issuance(&self, id: &Hash) -> bool;

    /// Remember an issuance id until `expiry_ms`.
    fn remember_issuance(&mut self, id: Hash, expiry_ms: u64);

    /// Forget remembered issuances whose expiry is at or before
    /// `before_ms`.
    fn prune_issuances(&mut self, before_ms: u64);
}

/// In-memory snapshot with a deterministic sorted-leaf root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemSnapshot {
    utxos: BTreeSet<Hash>,
    issuances: BTreeMap<Hash, u64>,
}

impl MemSnapshot {
    pub fn new() -> MemSnapshot {
        MemSnapshot::default()
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    sha3_256(&[&[0x01], left.as_bytes(), right.as_bytes()])
}

impl Snapshot for MemSnapshot {
    fn contains(&self, id: &Hash) -> bool {
        self.utxos.contains(id)
    }

    fn insert(&mut self, id: &Hash) {
        self.utxos.insert(*id);
    }

    fn delete(&mut self, id: &Hash) {
        self.utxos.remove(id);
    }

    fn root_hash(&self) -> Hash {
        // Sorted leaves, leaf/interior domain separation, odd node
        // promoted unchanged.
        if self.utxos.is_empty() {
            return sha3_256(&[&[0x00]]);
        }
        let mut level: Vec<Hash> = self
            .utxos
            .iter()
            .map(|id| sha3_256(&[&[0x00], id.as_bytes()]))
            .collect();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                match pair {
                    [l, r] => next.push(hash_pair(l, r)),
                    [l] => next.push(*l),
                    _ => unreachable!(),
                }
            }
            level = next;
        }
        level[0]
    }

    fn contains_issuance(&self, id: &Hash) -> bool {
        self.issuances.contains_key(id)
    }

    fn remember_issuance(&mut self, id: Hash, expiry_ms: u64) {
        self.issuances.insert(id, expiry_ms);
    }

    fn prune_issuances(&mut self, before_ms: u64) {
        self.issuances.retain(|_, expiry| *expiry > before_ms);
    }
}
