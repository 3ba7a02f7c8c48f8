//! Protocol-layer transaction builder.
//!
//! The builder accumulates inputs and pending results, routing all value
//! through a single internal mux. Outputs and retirements are not
//! materialized until [`Builder::build`], because their value sources
//! must name the mux by id and the mux is not complete until every input
//! has been added.

use std::collections::HashMap;

use crate::entry::{
    Entry, Header, Issuance, Mux, Nonce, Output, Prevout, Retirement, Spend, TimeRange,
    ValueDestination, ValueSource,
};
use crate::transaction::Transaction;
use crate::types::{AssetAmount, Hash, Program};
use crate::vm::ops::OP_TRUE;

struct PendingOutput {
    value: AssetAmount,
    control_program: Program,
    data: Hash,
}

struct PendingRetirement {
    value: AssetAmount,
    data: Hash,
}

/// Assembles an entry graph from add-input/add-result calls.
pub struct Builder {
    header: Header,
    mux_program: Program,
    sources: Vec<ValueSource>,
    entries: HashMap<Hash, Entry>,
    inputs: Vec<Hash>,
    outputs: Vec<PendingOutput>,
    retirements: Vec<PendingRetirement>,
}

impl Builder {
    /// Start a new builder. When `base` is given, all of its inputs and
    /// results are replayed into the new builder, allowing collaborative
    /// extension of a partially built transaction.
    pub fn new(version: u64, min_time_ms: u64, max_time_ms: u64, base: Option<&Transaction>) -> Builder {
        let mut builder = Builder {
            header: Header::new(version, min_time_ms, max_time_ms),
            mux_program: Program::new(1, vec![OP_TRUE]),
            sources: Vec::new(),
            entries: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            retirements: Vec::new(),
        };
        if let Some(base) = base {
            builder.replay(base);
        }
        builder
    }

    fn replay(&mut self, base: &Transaction) {
        if !base.data().is_zero() {
            self.header.body.data = base.data();
        }
        for iss_id in base.issuances() {
            if let Some(Entry::Issuance(iss)) = base.entry(iss_id) {
                // Carry the anchor chain over so the new graph is complete.
                let mut anchor_id = iss.body.anchor;
                while let Some(anchor) = base.entry(&anchor_id) {
                    self.entries.insert(anchor_id, anchor.clone());
                    match anchor {
                        Entry::Nonce(nonce) => anchor_id = nonce.body.time_range,
                        _ => break,
                    }
                }
                let new_id = self.add_issuance(iss.body.anchor, iss.body.value, iss.body.data);
                if let Some(Entry::Issuance(new_iss)) = self.entries.get_mut(&new_id) {
                    new_iss.witness = iss.witness.clone();
                }
            }
        }
        for sp_id in base.spends() {
            if let Some(Entry::Spend(sp)) = base.entry(sp_id) {
                if let Some(Entry::Output(out)) = base.entry(&sp.body.spent_output) {
                    self.add_full_spend(out.clone(), sp.body.data);
                } else if let Some(prevout) = &sp.prevout {
                    self.add_prevout_spend(sp.body.spent_output, prevout.clone(), sp.body.data);
                }
            }
        }
        for out_id in base.outputs() {
            if let Some(Entry::Output(out)) = base.entry(out_id) {
                self.add_output(out.asset_amount(), out.body.control_program.clone(), out.body.data);
            }
        }
        for ret_id in base.retirements() {
            if let Some(Entry::Retirement(ret)) = base.entry(ret_id) {
                self.add_retirement(ret.body.source.value, ret.body.data);
            }
        }
    }

    pub fn data(&self) -> Hash {
        self.header.body.data
    }

    /// Set the header's reference data hash. The template layer enforces
    /// write-once semantics on top of this.
    pub fn set_data(&mut self, data: Hash) {
        self.header.body.data = data;
    }

    pub fn min_time_ms(&self) -> u64 {
        self.header.body.min_time_ms
    }

    pub fn max_time_ms(&self) -> u64 {
        self.header.body.max_time_ms
    }

    /// Raise the minimum time; later calls can only narrow the window.
    pub fn restrict_min_time_ms(&mut self, min_time_ms: u64) {
        if min_time_ms > self.header.body.min_time_ms {
            self.header.body.min_time_ms = min_time_ms;
        }
    }

    /// Lower the maximum time; later calls can only narrow the window.
    pub fn restrict_max_time_ms(&mut self, max_time_ms: u64) {
        if max_time_ms < self.header.body.max_time_ms {
            self.header.body.max_time_ms = max_time_ms;
        }
    }

    /// Add a time range entry, returning its id for use as a nonce bound.
    pub fn add_time_range(&mut self, min_time_ms: u64, max_time_ms: u64) -> Hash {
        self.insert(Entry::TimeRange(TimeRange::new(min_time_ms, max_time_ms)))
    }

    /// Add a nonce entry bounded by the given time range.
    pub fn add_nonce(&mut self, program: Program, time_range: Hash) -> Hash {
        self.insert(Entry::Nonce(Nonce::new(program, time_range)))
    }

    /// Add an issuance input anchored at `anchor` (a nonce id, or zero
    /// for an empty anchor). Returns the issuance entry id.
    pub fn add_issuance(&mut self, anchor: Hash, value: AssetAmount, data: Hash) -> Hash {
        let iss = Issuance::new(anchor, value, data);
        let id = self.insert(Entry::Issuance(iss));
        self.add_input_source(id, value);
        id
    }

    /// Populate an issuance's witness: the chain of origin, asset
    /// definition, and issuance program the VM will run. Witness data is
    /// outside the identity hash, so the id is unchanged.
    pub fn set_issuance_witness(
        &mut self,
        issuance_id: &Hash,
        initial_block_id: Hash,
        asset_definition_hash: Hash,
        issuance_program: Program,
    ) -> bool {
        match self.entries.get_mut(issuance_id) {
            Some(Entry::Issuance(iss)) => {
                iss.witness.initial_block_id = initial_block_id;
                iss.witness.asset_definition_hash = asset_definition_hash;
                iss.witness.issuance_program = issuance_program;
                true
            }
            _ => false,
        }
    }

    /// Add a spend of a fully known output entry. The output is carried
    /// in the graph so validators can resolve the spend's value and
    /// control program.
    pub fn add_full_spend(&mut self, spent_output: Output, data: Hash) -> Hash {
        let value = spent_output.asset_amount();
        let output_id = self.insert(Entry::Output(spent_output));
        let id = self.insert(Entry::Spend(Spend::new(output_id, data)));
        self.add_input_source(id, value);
        id
    }

    /// Add a spend of an output known only by id, carrying the prevout
    /// record `{asset_amount, program}` needed for validation.
    pub fn add_prevout_spend(&mut self, output_id: Hash, prevout: Prevout, data: Hash) -> Hash {
        let value = prevout.value;
        let id = self.insert(Entry::Spend(Spend::with_prevout(output_id, prevout, data)));
        self.add_input_source(id, value);
        id
    }

    /// Queue an output. Output entries are created at build time, once
    /// the mux id is known.
    pub fn add_output(&mut self, value: AssetAmount, control_program: Program, data: Hash) {
        self.outputs.push(PendingOutput {
            value,
            control_program,
            data,
        });
    }

    /// Queue a retirement. Like outputs, created at build time.
    pub fn add_retirement(&mut self, value: AssetAmount, data: Hash) {
        self.retirements.push(PendingRetirement { value, data });
    }

    fn insert(&mut self, entry: Entry) -> Hash {
        let id = entry.id();
        self.entries.insert(id, entry);
        id
    }

    fn add_input_source(&mut self, input_id: Hash, value: AssetAmount) {
        self.inputs.push(input_id);
        self.sources.push(ValueSource {
            ref_id: input_id,
            value,
            position: 0,
        });
    }

    /// Materialize outputs and retirements, wire the mux, and freeze the
    /// graph into a [`Transaction`].
    pub fn build(mut self) -> Transaction {
        let mut mux = Mux::new(self.sources, self.mux_program);
        let mux_id = Entry::Mux(mux.clone()).id();

        let mut position = 0u64;
        for pending in self.outputs {
            let source = ValueSource {
                ref_id: mux_id,
                value: pending.value,
                position,
            };
            let output = Output::new(source, pending.control_program, pending.data);
            let output_id = Entry::Output(output.clone()).id();
            self.entries.insert(output_id, Entry::Output(output));
            self.header.body.results.push(output_id);
            mux.witness.destinations.push(ValueDestination {
                ref_id: output_id,
                position,
            });
            position += 1;
        }
        for pending in self.retirements {
            let source = ValueSource {
                ref_id: mux_id,
                value: pending.value,
                position,
            };
            let retirement = Retirement::new(source, pending.data);
            let retirement_id = Entry::Retirement(retirement.clone()).id();
            self.entries.insert(retirement_id, Entry::Retirement(retirement));
            self.header.body.results.push(retirement_id);
            mux.witness.destinations.push(ValueDestination {
                ref_id: retirement_id,
                position,
            });
            position += 1;
        }

        // Point every input's witness destination at the mux.
        for (source_position, input_id) in self.inputs.iter().enumerate() {
            let destination = ValueDestination {
                ref_id: mux_id,
                position: source_position as u64,
            };
            match self.entries.get_mut(input_id) {
                Some(Entry::Spend(sp)) => sp.witness.destination = destination,
                Some(Entry::Issuance(iss)) => iss.witness.destination = destination,
                _ => {}
            }
        }

        self.entries.insert(mux_id, Entry::Mux(mux));
        Transaction::new(self.header, self.entries)
    }
}
