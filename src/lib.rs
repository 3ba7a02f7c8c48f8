//! # txgraph
//!
//! Core transaction engine for a UTXO-style ledger built on a graph of
//! content-addressed entries.
//!
//! A transaction is a directed acyclic graph of typed entries (header,
//! mux, issuances, spends, outputs, retirements, nonces, time ranges),
//! each identified by a recursive hash of its committed body. All input
//! value flows through a single mux to the ordered results, balanced
//! per asset in checked i64 arithmetic. Spends and issuances are
//! authorized by programs run in a metered stack VM with opcodes that
//! introspect the surrounding transaction, and blocks chain by applying
//! ordered transactions to a snapshot of the unspent-output set.
//!
//! ## Layers
//!
//! - [`types`], [`serialization`], [`entry`]: primitives, the wire
//!   format, and the entry graph with its identity rule
//! - [`transaction`], [`builder`]: the arena of entries and the
//!   protocol-level builder
//! - [`template`], [`witness`], [`finalize`]: the cooperative assembly
//!   layer with signing instructions, predicate construction, witness
//!   materialization, and the tx-sighash idempotency anchor
//! - [`validation`], [`block`], [`state`], [`merkle`]: context-free and
//!   stateful validation, block chaining, and the snapshot contract
//! - [`vm`], [`vmutil`]: the virtual machine and program-building
//!   helpers

pub mod block;
pub mod builder;
pub mod entry;
pub mod error;
pub mod finalize;
pub mod merkle;
pub mod serialization;
pub mod state;
pub mod template;
pub mod transaction;
pub mod types;
pub mod validation;
pub mod vm;
pub mod vmutil;
pub mod witness;

pub use block::{
    apply_block, validate_block, validate_block_for_accept, validate_block_header, Block,
};
pub use builder::Builder;
pub use entry::{Entry, Prevout};
pub use error::{
    ActionError, BadTxReason, BuildError, SigningError, ValidationError, VmError,
};
pub use finalize::{check_tx_sighash_commitment, finalize_tx, Submitter};
pub use state::{MemSnapshot, Snapshot};
pub use template::{build, Action, SigningInstruction, Template, TemplateBuilder};
pub use transaction::Transaction;
pub use types::{compute_asset_id, AssetAmount, AssetId, Hash, Program, MAX_AMOUNT};
pub use validation::{apply_tx, check_tx_well_formed, confirm_tx};
pub use vm::{CancelToken, INITIAL_RUN_LIMIT};
pub use witness::{key_ids, KeyId, SignatureWitness, WitnessComponent, XPub};
