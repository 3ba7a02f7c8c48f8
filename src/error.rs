//! Error types for the transaction engine.
//!
//! Each layer has its own error family: the VM, context-free and stateful
//! validation, the builder/template layer, and signing/finalization.
//! Validation failures caused by a transaction's own content are wrapped
//! in [`ValidationError::BadTx`] with a structured reason.

use thiserror::Error;

use crate::types::{AssetId, Hash};

/// Errors produced by the virtual machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("data stack underflow")]
    DataStackUnderflow,

    #[error("alt stack underflow")]
    AltStackUnderflow,

    #[error("control stack underflow")]
    ControlStackUnderflow,

    #[error("control stack not empty at end of program")]
    NonEmptyControlStack,

    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("unsupported vm version {0}")]
    UnsupportedVm(u64),

    #[error("run limit exceeded")]
    RunLimitExceeded,

    #[error("bad value")]
    BadValue,

    #[error("value out of range")]
    Range,

    #[error("division by zero")]
    DivZero,

    #[error("no transaction or block context bound")]
    Context,

    #[error("program ended inside a push")]
    UnexpectedEnd,

    #[error("VERIFY failed")]
    VerifyFailed,

    #[error("FAIL executed")]
    Return,

    #[error("false result at end of program")]
    FalseResult,

    #[error("entry {0} not present in transaction")]
    MissingEntry(Hash),

    #[error("execution cancelled")]
    Cancelled,
}

/// Structured reason for a transaction failing validation.
///
/// Every variant is a `badtx` cause: the transaction itself is at fault,
/// independent of who submitted it or when.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BadTxReason {
    #[error("unknown transaction version {version} for block version {block_version}")]
    TxVersion { version: u64, block_version: u64 },

    #[error("block time is before transaction min time")]
    NotYet,

    #[error("block time is after transaction max time")]
    TooLate,

    #[error("issuance is for a different blockchain")]
    WrongBlockchain,

    #[error("zero min or max time not allowed in issuance time range")]
    TimelessIssuance,

    #[error("block timestamp outside issuance input's time window")]
    IssuanceTime,

    #[error("duplicate issuance")]
    DuplicateIssuance,

    #[error("output {output} for spend input {input} is not in the snapshot")]
    InvalidOutput { output: Hash, input: Hash },

    #[error("inputs are missing")]
    NoInputs,

    #[error("number of inputs overflows int32")]
    TooManyInputs,

    #[error("all inputs are issuances with empty anchors")]
    AllEmptyNonceIssuances,

    #[error("positive max time must be >= min time")]
    MisorderedTime,

    #[error("unknown asset version")]
    AssetVersion,

    #[error("input value exceeds maximum value of int64")]
    InputTooBig,

    #[error("adding input {input} overflows the allowed asset amount")]
    InputSumTooBig { input: Hash },

    #[error("unknown vm version {vm_version} in input {input}")]
    VmVersion { vm_version: u64, input: Hash },

    #[error("duplicate input {input}")]
    DuplicateInput { input: Hash },

    #[error("number of results overflows int32")]
    TooManyOutputs,

    #[error("output value must be greater than 0")]
    EmptyOutput,

    #[error("output value exceeds maximum value of int64")]
    OutputTooBig,

    #[error("adding result {output} overflows the allowed asset amount")]
    OutputSumTooBig { output: Hash },

    #[error("amounts for asset {asset} are not balanced on inputs and outputs")]
    UnbalancedV1 { asset: AssetId },

    #[error("script execution failed in input {input}: {source}")]
    ScriptFailure { input: Hash, source: VmError },

    #[error("entry {0} not present in transaction")]
    MissingEntry(Hash),
}

/// Errors from transaction and block validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid transaction: {0}")]
    BadTx(#[from] BadTxReason),

    #[error("invalid previous block hash")]
    BadPrevHash,

    #[error("invalid block height")]
    BadHeight,

    #[error("invalid block timestamp")]
    BadTimestamp,

    #[error("unspendable block script")]
    BadScript,

    #[error("invalid signature script: {detail}")]
    BadSig { detail: String },

    #[error("invalid transaction merkle root")]
    BadTxRoot,

    #[error("invalid state merkle root")]
    BadStateRoot,

    #[error("validation cancelled")]
    Cancelled,
}

impl ValidationError {
    /// The structured `badtx` reason, if this is a transaction fault.
    pub fn bad_tx_reason(&self) -> Option<&BadTxReason> {
        match self {
            ValidationError::BadTx(reason) => Some(reason),
            _ => None,
        }
    }
}

/// A single failed action inside a template build, tagged with its index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("action {index}: {source}")]
pub struct ActionError {
    pub index: usize,
    #[source]
    pub source: Box<BuildError>,
}

/// Errors from the builder and template layers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("required field is missing: {0}")]
    MissingFields(&'static str),

    #[error("reference data does not match template's existing reference data")]
    BadRefData,

    #[error("amount {0} exceeds maximum value 2^63-1")]
    BadAmount(u64),

    #[error("unsafe transaction: leaves assets free to control")]
    BlankCheck,

    #[error("errors occurred in one or more actions")]
    Action(Vec<ActionError>),

    #[error("witness component {index} has unknown type {kind:?}")]
    BadWitnessComponent { index: usize, kind: String },

    #[error("entry {0} not present in transaction")]
    MissingEntry(Hash),

    #[error("template decoding failed: {0}")]
    Decode(String),
}

/// Errors from signing and finalization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("no attempt to sign the transaction sighash")]
    NoTxSighashAttempt,

    #[error("transaction signature was attempted but failed")]
    TxSignatureFailure,

    #[error("no commitment to the transaction sighash")]
    NoTxSighashCommitment,

    #[error("missing raw transaction")]
    MissingRawTx,

    #[error("too many signing instructions in template")]
    BadInstructionCount,

    #[error("empty signature program")]
    EmptyProgram,

    #[error("transaction rejected: {0}")]
    Rejected(ValidationError),

    #[error("signer failed for key {key_index}: {detail}")]
    Signer { key_index: usize, detail: String },
}
