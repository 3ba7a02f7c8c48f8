//! Transactions as arenas of content-addressed entries.
//!
//! A [`Transaction`] owns one header plus every entry reachable from it,
//! keyed by entry id. Bodies are frozen once the transaction is built;
//! only witness fields (input arguments) may be populated afterwards,
//! which never changes any id.

use std::collections::{HashMap, HashSet};

use crate::entry::{read_entry, write_entry, Entry, Header, Output, Spend};
use crate::serialization::{write_varint31, ReadError, Reader};
use crate::types::{sha3_256, AssetAmount, Hash, Program};

/// A complete transaction graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    header: Header,
    id: Hash,
    entries: HashMap<Hash, Entry>,
    issuances: Vec<Hash>,
    spends: Vec<Hash>,
    outputs: Vec<Hash>,
    retirements: Vec<Hash>,
}

impl Transaction {
    /// Assemble a transaction from a header and its entries.
    ///
    /// Results (outputs and retirements) come from the header's result
    /// list alone: an output entry that is merely carried in the graph
    /// as the target of a full spend is not a result of this
    /// transaction. Inputs are recovered in walk order; inputs not
    /// (yet) reachable from any result, as in a partially built
    /// transaction, are swept afterwards in id order so intermediate
    /// transactions survive a round trip through the template wire
    /// format.
    pub fn new(header: Header, entries: HashMap<Hash, Entry>) -> Transaction {
        let id = header.id();
        let mut tx = Transaction {
            header,
            id,
            entries,
            issuances: Vec::new(),
            spends: Vec::new(),
            outputs: Vec::new(),
            retirements: Vec::new(),
        };

        for result_id in &tx.header.body.results {
            match tx.entries.get(result_id) {
                Some(Entry::Output(_)) => tx.outputs.push(*result_id),
                Some(Entry::Retirement(_)) => tx.retirements.push(*result_id),
                _ => {}
            }
        }

        let mut seen = HashSet::new();
        let inputs: Vec<(Hash, &'static str)> = tx
            .ordered_entries()
            .iter()
            .map(|(id, e)| (*id, e.type_tag()))
            .collect();
        for (entry_id, tag) in inputs {
            if !seen.insert(entry_id) {
                continue;
            }
            match tag {
                crate::entry::TYPE_ISSUANCE => tx.issuances.push(entry_id),
                crate::entry::TYPE_SPEND => tx.spends.push(entry_id),
                _ => {}
            }
        }
        tx
    }

    /// The transaction id: the entry id of its header.
    pub fn id(&self) -> Hash {
        self.id
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn version(&self) -> u64 {
        self.header.body.version
    }

    pub fn data(&self) -> Hash {
        self.header.body.data
    }

    pub fn min_time_ms(&self) -> u64 {
        self.header.body.min_time_ms
    }

    pub fn max_time_ms(&self) -> u64 {
        self.header.body.max_time_ms
    }

    /// Ordered result ids (outputs and retirements), as committed by the
    /// header.
    pub fn results(&self) -> &[Hash] {
        &self.header.body.results
    }

    pub fn issuances(&self) -> &[Hash] {
        &self.issuances
    }

    pub fn spends(&self) -> &[Hash] {
        &self.spends
    }

    pub fn outputs(&self) -> &[Hash] {
        &self.outputs
    }

    pub fn retirements(&self) -> &[Hash] {
        &self.retirements
    }

    /// Ids of all inputs: spends first, then issuances.
    pub fn input_ids(&self) -> impl Iterator<Item = &Hash> {
        self.spends.iter().chain(self.issuances.iter())
    }

    pub fn entry(&self, id: &Hash) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Hash, &Entry)> {
        self.entries.iter()
    }

    /// The per-input signature hash: `SHA3-256(input_id || tx_id)`.
    pub fn sig_hash(&self, input_id: &Hash) -> Hash {
        sha3_256(&[input_id.as_bytes(), self.id.as_bytes()])
    }

    /// The asset amount consumed by a spend: from the spent output entry
    /// if present in the arena, else from the spend's prevout record.
    pub fn spend_asset_amount(&self, spend: &Spend) -> Option<AssetAmount> {
        if let Some(Entry::Output(out)) = self.entries.get(&spend.body.spent_output) {
            return Some(out.asset_amount());
        }
        spend.prevout.as_ref().map(|p| p.value)
    }

    /// The control program guarding a spend's spent output.
    pub fn spend_control_program<'a>(&'a self, spend: &'a Spend) -> Option<&'a Program> {
        if let Some(Entry::Output(out)) = self.entries.get(&spend.body.spent_output) {
            return Some(&out.body.control_program);
        }
        spend.prevout.as_ref().map(|p| &p.program)
    }

    pub fn output_entry(&self, id: &Hash) -> Option<&Output> {
        match self.entries.get(id) {
            Some(Entry::Output(out)) => Some(out),
            _ => None,
        }
    }

    pub fn spend_entry(&self, id: &Hash) -> Option<&Spend> {
        match self.entries.get(id) {
            Some(Entry::Spend(sp)) => Some(sp),
            _ => None,
        }
    }

    /// Witness arguments of the given input, if it is a spend or
    /// issuance.
    pub fn arguments(&self, input_id: &Hash) -> Option<&[Vec<u8>]> {
        match self.entries.get(input_id)? {
            Entry::Spend(sp) => Some(&sp.witness.arguments),
            Entry::Issuance(iss) => Some(&iss.witness.arguments),
            _ => None,
        }
    }

    /// Set the witness arguments of an input. Returns false when the id
    /// does not name a spend or issuance. Witnesses are outside the
    /// identity hash, so this never changes any entry id.
    pub fn set_arguments(&mut self, input_id: &Hash, arguments: Vec<Vec<u8>>) -> bool {
        match self.entries.get_mut(input_id) {
            Some(Entry::Spend(sp)) => {
                sp.witness.arguments = arguments;
                true
            }
            Some(Entry::Issuance(iss)) => {
                iss.witness.arguments = arguments;
                true
            }
            _ => false,
        }
    }

    /// Depth-first walk over all entries reachable from the header,
    /// deduplicated by id, in deterministic discovery order: each result,
    /// then its source mux, the mux's sources in order, and each input's
    /// spent output or anchor chain (nonce, then its time range).
    pub fn walk(&self) -> Vec<(Hash, &Entry)> {
        let mut visited = HashSet::new();
        let mut found = Vec::new();
        for result_id in &self.header.body.results {
            self.visit(*result_id, &mut visited, &mut found);
        }
        found
    }

    fn visit<'a>(
        &'a self,
        id: Hash,
        visited: &mut HashSet<Hash>,
        found: &mut Vec<(Hash, &'a Entry)>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let entry = match self.entries.get(&id) {
            Some(entry) => entry,
            None => return,
        };
        found.push((id, entry));
        match entry {
            Entry::Output(out) => self.visit(out.body.source.ref_id, visited, found),
            Entry::Retirement(ret) => self.visit(ret.body.source.ref_id, visited, found),
            Entry::Mux(mux) => {
                for source in &mux.body.sources {
                    self.visit(source.ref_id, visited, found);
                }
            }
            Entry::Spend(sp) => self.visit(sp.body.spent_output, visited, found),
            Entry::Issuance(iss) => self.visit(iss.body.anchor, visited, found),
            Entry::Nonce(nonce) => self.visit(nonce.body.time_range, visited, found),
            Entry::TimeRange(_) => {}
        }
    }

    /// Walk-discovered entries followed by any entries the walk did not
    /// reach, the latter sorted by id. For a complete transaction this is
    /// exactly the walk.
    fn ordered_entries(&self) -> Vec<(Hash, &Entry)> {
        let mut ordered = self.walk();
        if ordered.len() < self.entries.len() {
            let reached: HashSet<Hash> = ordered.iter().map(|(id, _)| *id).collect();
            let mut rest: Vec<(Hash, &Entry)> = self
                .entries
                .iter()
                .filter(|(id, _)| !reached.contains(id))
                .map(|(id, e)| (*id, e))
                .collect();
            rest.sort_by_key(|(id, _)| *id);
            ordered.extend(rest);
        }
        ordered
    }

    /// Serialize as `header || varint31(n) || entries…` with the entries
    /// in walk discovery order (plus unreached entries of a partial
    /// transaction, in id order). Entry order is not part of identity;
    /// the ids are.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.header.body_bytes();
        let entries = self.ordered_entries();
        write_varint31(&mut buf, entries.len() as u64);
        for (_, entry) in entries {
            write_entry(&mut buf, entry);
        }
        buf
    }

    pub(crate) fn read_from(r: &mut Reader) -> Result<Transaction, ReadError> {
        let header = Header::read_body(r)?;
        let n = r.read_varint31()?;
        let mut entries = HashMap::with_capacity(n.min(1024) as usize);
        for _ in 0..n {
            let entry = read_entry(r)?;
            entries.insert(entry.id(), entry);
        }
        Ok(Transaction::new(header, entries))
    }

    /// Decode the output of [`Transaction::to_bytes`]. The whole input
    /// must be consumed.
    pub fn from_bytes(data: &[u8]) -> Result<Transaction, ReadError> {
        let mut r = Reader::new(data);
        let tx = Transaction::read_from(&mut r)?;
        if !r.is_empty() {
            return Err(ReadError::TrailingBytes);
        }
        Ok(tx)
    }
}
