//! Template builder: the assembly layer over the protocol builder.
//!
//! A template pairs a (possibly unbalanced) transaction with signing
//! instructions for each of its inputs, and travels between cosigners
//! as a JSON record. Builds are action-driven: each action contributes
//! inputs, results, or metadata, may register rollback hooks, and
//! failures are collected per action index.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::builder::Builder;
use crate::entry::{Output, Prevout};
use crate::error::{ActionError, BuildError};
use crate::transaction::Transaction;
use crate::types::{sha3_256, AssetAmount, Hash, Program, MAX_AMOUNT};
use crate::witness::{SignatureWitness, SignerFn, WitnessComponent, XPub};

/// Directions for satisfying one input of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningInstruction {
    /// Id of the input entry this instruction signs.
    pub hash: Hash,
    pub asset_amount: AssetAmount,
    pub witness_components: Vec<WitnessComponent>,
}

impl SigningInstruction {
    pub fn new(hash: Hash, asset_amount: AssetAmount) -> SigningInstruction {
        SigningInstruction {
            hash,
            asset_amount,
            witness_components: Vec::new(),
        }
    }

    /// Append a signature component requiring `quorum` of `keys`.
    pub fn add_witness_keys(&mut self, keys: Vec<crate::witness::KeyId>, quorum: u32) {
        self.witness_components
            .push(WitnessComponent::Signature(SignatureWitness {
                quorum,
                keys,
                program: Vec::new(),
                sigs: Vec::new(),
            }));
    }
}

/// A partially- or fully-signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub transaction: Transaction,
    pub signing_instructions: Vec<SigningInstruction>,

    /// Bare reference data by its hash, kept locally for lookup after
    /// finalize. Not part of the wire record.
    pub ref_data: HashMap<Hash, Vec<u8>>,

    /// True when every input is signed by keys this node manages.
    pub local: bool,

    /// Whether signatures commit to the whole transaction or to
    /// constraints allowing partners to add further actions.
    pub allow_additional_actions: bool,
}

impl Template {
    /// The signing hash for one input.
    pub fn sig_hash(&self, input_id: &Hash) -> Hash {
        self.transaction.sig_hash(input_id)
    }

    /// Run one signing round: every component of every instruction gets
    /// a chance to collect signatures from `xpubs`, then the witnesses
    /// are materialized into the transaction's input arguments.
    ///
    /// Rounds merge conflict-free: each signature occupies a fixed
    /// (input, component, key) slot.
    pub fn sign(&mut self, xpubs: &[XPub], signer: &mut SignerFn) -> Result<(), crate::error::SigningError> {
        let mut instructions = std::mem::take(&mut self.signing_instructions);
        let result = (|| {
            for instruction in &mut instructions {
                for component in &mut instruction.witness_components {
                    let WitnessComponent::Signature(sw) = component;
                    sw.sign(
                        &self.transaction,
                        &instruction.hash,
                        self.allow_additional_actions,
                        xpubs,
                        signer,
                    )?;
                }
            }
            Ok(())
        })();
        self.signing_instructions = instructions;
        result?;
        self.materialize()
    }

    /// Lay out every instruction's components into its input's argument
    /// vector.
    pub fn materialize(&mut self) -> Result<(), crate::error::SigningError> {
        let n_inputs = self.transaction.spends().len() + self.transaction.issuances().len();
        if self.signing_instructions.len() > n_inputs {
            return Err(crate::error::SigningError::BadInstructionCount);
        }
        for instruction in &self.signing_instructions {
            let mut args: Vec<Vec<u8>> = Vec::new();
            for component in &instruction.witness_components {
                let WitnessComponent::Signature(sw) = component;
                sw.materialize(&mut args);
            }
            self.transaction.set_arguments(&instruction.hash, args);
        }
        Ok(())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&TemplateWire::from(self)).expect("template serializes")
    }

    pub fn from_json(text: &str) -> Result<Template, BuildError> {
        let wire: TemplateWire =
            serde_json::from_str(text).map_err(|e| BuildError::Decode(e.to_string()))?;
        wire.try_into()
    }
}

/// One step of a build: contributes to the template builder, may fail
/// independently of its peers.
pub trait Action {
    fn build(&self, builder: &mut TemplateBuilder) -> Result<(), BuildError>;
}

/// Build a template by running `actions` over a fresh builder seeded
/// from `base` (when extending a partner's transaction). Per-action
/// failures are collected into a composite error, and all rollback
/// hooks run before it is returned.
pub fn build(
    actions: &[&dyn Action],
    base: Option<&Transaction>,
    max_time_ms: u64,
) -> Result<Template, BuildError> {
    let mut builder = TemplateBuilder::new(base, max_time_ms);

    let mut errors: Vec<ActionError> = Vec::new();
    for (index, action) in actions.iter().enumerate() {
        if let Err(err) = action.build(&mut builder) {
            errors.push(ActionError {
                index,
                source: Box::new(err),
            });
        }
    }
    if !errors.is_empty() {
        debug!("template build failed in {} action(s)", errors.len());
        builder.rollback();
        return Err(BuildError::Action(errors));
    }

    match builder.materialize() {
        Ok(template) => Ok(template),
        Err((builder, err)) => {
            builder.rollback();
            Err(err)
        }
    }
}

type BuildCallback = Box<dyn FnOnce() -> Result<(), BuildError>>;

/// Wraps the protocol [`Builder`] with signing instructions, reference
/// data bookkeeping, and rollback/build hooks.
pub struct TemplateBuilder {
    inner: Builder,
    signing_instructions: Vec<SigningInstruction>,
    ref_data: HashMap<Hash, Vec<u8>>,
    rollbacks: Vec<Box<dyn FnOnce()>>,
    callbacks: Vec<BuildCallback>,
    local: bool,
}

impl TemplateBuilder {
    pub fn new(base: Option<&Transaction>, max_time_ms: u64) -> TemplateBuilder {
        TemplateBuilder {
            inner: Builder::new(1, 0, max_time_ms, base),
            signing_instructions: Vec::new(),
            ref_data: HashMap::new(),
            rollbacks: Vec::new(),
            callbacks: Vec::new(),
            local: base.is_none(),
        }
    }

    fn check_amount(amount: u64) -> Result<(), BuildError> {
        if amount > MAX_AMOUNT {
            return Err(BuildError::BadAmount(amount));
        }
        Ok(())
    }

    pub fn add_time_range(&mut self, min_time_ms: u64, max_time_ms: u64) -> Hash {
        self.inner.add_time_range(min_time_ms, max_time_ms)
    }

    pub fn add_nonce(&mut self, program: Program, time_range: Hash) -> Hash {
        self.inner.add_nonce(program, time_range)
    }

    pub fn add_issuance(
        &mut self,
        anchor: Hash,
        value: AssetAmount,
        data: Hash,
        instruction: Option<SigningInstruction>,
    ) -> Result<Hash, BuildError> {
        Self::check_amount(value.amount)?;
        let id = self.inner.add_issuance(anchor, value, data);
        self.push_instruction(id, value, instruction);
        Ok(id)
    }

    pub fn set_issuance_witness(
        &mut self,
        issuance_id: &Hash,
        initial_block_id: Hash,
        asset_definition_hash: Hash,
        issuance_program: Program,
    ) -> bool {
        self.inner.set_issuance_witness(
            issuance_id,
            initial_block_id,
            asset_definition_hash,
            issuance_program,
        )
    }

    pub fn add_full_spend(
        &mut self,
        spent_output: Output,
        data: Hash,
        instruction: Option<SigningInstruction>,
    ) -> Result<Hash, BuildError> {
        let value = spent_output.asset_amount();
        Self::check_amount(value.amount)?;
        let id = self.inner.add_full_spend(spent_output, data);
        self.push_instruction(id, value, instruction);
        Ok(id)
    }

    pub fn add_prevout_spend(
        &mut self,
        output_id: Hash,
        prevout: Prevout,
        data: Hash,
        instruction: Option<SigningInstruction>,
    ) -> Result<Hash, BuildError> {
        let value = prevout.value;
        Self::check_amount(value.amount)?;
        let id = self.inner.add_prevout_spend(output_id, prevout, data);
        self.push_instruction(id, value, instruction);
        Ok(id)
    }

    pub fn add_output(
        &mut self,
        value: AssetAmount,
        control_program: Program,
        data: Hash,
    ) -> Result<(), BuildError> {
        Self::check_amount(value.amount)?;
        self.inner.add_output(value, control_program, data);
        Ok(())
    }

    pub fn add_retirement(&mut self, value: AssetAmount, data: Hash) -> Result<(), BuildError> {
        Self::check_amount(value.amount)?;
        self.inner.add_retirement(value, data);
        Ok(())
    }

    fn push_instruction(
        &mut self,
        input_id: Hash,
        value: AssetAmount,
        instruction: Option<SigningInstruction>,
    ) {
        if let Some(mut instruction) = instruction {
            instruction.hash = input_id;
            instruction.asset_amount = value;
            self.signing_instructions.push(instruction);
        }
    }

    pub fn restrict_min_time_ms(&mut self, min_time_ms: u64) {
        self.inner.restrict_min_time_ms(min_time_ms);
    }

    pub fn restrict_max_time_ms(&mut self, max_time_ms: u64) {
        self.inner.restrict_max_time_ms(max_time_ms);
    }

    pub fn max_time_ms(&self) -> u64 {
        self.inner.max_time_ms()
    }

    /// Set the transaction-level reference data. Write-once: a second
    /// call with different data fails with [`BuildError::BadRefData`].
    pub fn set_reference_data(&mut self, data: &[u8]) -> Result<(), BuildError> {
        let data_hash = sha3_256(&[data]);
        let existing = self.inner.data();
        if !existing.is_zero() && existing != data_hash {
            return Err(BuildError::BadRefData);
        }
        self.inner.set_data(data_hash);
        self.ref_data.insert(data_hash, data.to_vec());
        Ok(())
    }

    /// Register a best-effort undo hook, run if any action fails. Not
    /// atomic: each action's side effects must tolerate partial undo.
    pub fn on_rollback(&mut self, rollback: impl FnOnce() + 'static) {
        self.rollbacks.push(Box::new(rollback));
    }

    /// Register a hook to run after all actions succeed, before the
    /// template materializes.
    pub fn on_build(&mut self, callback: impl FnOnce() -> Result<(), BuildError> + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub(crate) fn rollback(self) {
        for rollback in self.rollbacks {
            rollback();
        }
    }

    /// Freeze the builder into a template, running build callbacks and
    /// the blank check. On failure the rollback hooks run first.
    pub fn build(self) -> Result<Template, BuildError> {
        match self.materialize() {
            Ok(template) => Ok(template),
            Err((builder, err)) => {
                builder.rollback();
                Err(err)
            }
        }
    }

    /// Run the build callbacks, freeze the transaction, and check for
    /// blank-check safety. On failure the builder is handed back so the
    /// caller can run its rollbacks.
    pub(crate) fn materialize(mut self) -> Result<Template, (TemplateBuilder, BuildError)> {
        let callbacks = std::mem::take(&mut self.callbacks);
        for callback in callbacks {
            if let Err(err) = callback() {
                return Err((self, err));
            }
        }

        let local = self.local;
        let signing_instructions = std::mem::take(&mut self.signing_instructions);
        let ref_data = std::mem::take(&mut self.ref_data);
        let rollbacks = std::mem::take(&mut self.rollbacks);
        let transaction = self.inner.build();

        if let Err(err) = check_blank_check(&transaction) {
            let mut builder = TemplateBuilder::new(None, 0);
            builder.rollbacks = rollbacks;
            return Err((builder, err));
        }

        Ok(Template {
            transaction,
            signing_instructions,
            ref_data,
            local,
            allow_additional_actions: false,
        })
    }
}

/// Reject a transaction that leaves some asset with free value to
/// control (positive net input) while no asset still requires inputs.
/// All other imbalances are legal intermediate states for cosigners to
/// complete.
fn check_blank_check(tx: &Transaction) -> Result<(), BuildError> {
    let mut net: HashMap<crate::types::AssetId, i64> = HashMap::new();
    for iss_id in tx.issuances() {
        if let Some(crate::entry::Entry::Issuance(iss)) = tx.entry(iss_id) {
            let entry = net.entry(iss.asset_id()).or_insert(0);
            *entry = entry
                .checked_add(iss.amount() as i64)
                .ok_or(BuildError::BadAmount(iss.amount()))?;
        }
    }
    for spend_id in tx.spends() {
        if let Some(spend) = tx.spend_entry(spend_id) {
            let value = tx
                .spend_asset_amount(spend)
                .ok_or(BuildError::MissingEntry(spend.body.spent_output))?;
            let entry = net.entry(value.asset_id).or_insert(0);
            *entry = entry
                .checked_add(value.amount as i64)
                .ok_or(BuildError::BadAmount(value.amount))?;
        }
    }
    for out_id in tx.outputs() {
        if let Some(out) = tx.output_entry(out_id) {
            let entry = net.entry(out.asset_id()).or_insert(0);
            *entry = entry
                .checked_sub(out.amount() as i64)
                .ok_or(BuildError::BadAmount(out.amount()))?;
        }
    }
    for ret_id in tx.retirements() {
        if let Some(crate::entry::Entry::Retirement(ret)) = tx.entry(ret_id) {
            let entry = net.entry(ret.asset_id()).or_insert(0);
            *entry = entry
                .checked_sub(ret.amount() as i64)
                .ok_or(BuildError::BadAmount(ret.amount()))?;
        }
    }

    let requires_outputs = net.values().any(|&amount| amount > 0);
    let requires_inputs = net.values().any(|&amount| amount < 0);
    if requires_outputs && !requires_inputs {
        return Err(BuildError::BlankCheck);
    }
    Ok(())
}

// --- wire record ---

#[derive(Serialize, Deserialize)]
struct TemplateWire {
    raw_transaction: String,
    signing_instructions: Vec<SigningInstructionWire>,
    local: bool,
    allow_additional_actions: bool,
}

#[derive(Serialize, Deserialize)]
struct SigningInstructionWire {
    hash: Hash,
    asset_amount: AssetAmount,
    #[serde(default)]
    witness_components: Vec<WitnessComponentWire>,
}

#[derive(Serialize, Deserialize)]
struct WitnessComponentWire {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    quorum: u32,
    #[serde(default)]
    keys: Vec<KeyIdWire>,
    #[serde(default)]
    program: String,
    #[serde(default, rename = "signatures")]
    sigs: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct KeyIdWire {
    xpub: String,
    derivation_path: Vec<String>,
}

impl From<&Template> for TemplateWire {
    fn from(tpl: &Template) -> TemplateWire {
        TemplateWire {
            raw_transaction: hex::encode(tpl.transaction.to_bytes()),
            signing_instructions: tpl
                .signing_instructions
                .iter()
                .map(|si| SigningInstructionWire {
                    hash: si.hash,
                    asset_amount: si.asset_amount,
                    witness_components: si
                        .witness_components
                        .iter()
                        .map(|component| {
                            let WitnessComponent::Signature(sw) = component;
                            WitnessComponentWire {
                                kind: "signature".to_string(),
                                quorum: sw.quorum,
                                keys: sw
                                    .keys
                                    .iter()
                                    .map(|key| KeyIdWire {
                                        xpub: hex::encode(key.xpub.0),
                                        derivation_path: key
                                            .derivation_path
                                            .iter()
                                            .map(hex::encode)
                                            .collect(),
                                    })
                                    .collect(),
                                program: hex::encode(&sw.program),
                                sigs: sw.sigs.iter().map(hex::encode).collect(),
                            }
                        })
                        .collect(),
                })
                .collect(),
            local: tpl.local,
            allow_additional_actions: tpl.allow_additional_actions,
        }
    }
}

impl TryFrom<TemplateWire> for Template {
    type Error = BuildError;

    fn try_from(wire: TemplateWire) -> Result<Template, BuildError> {
        let raw = hex::decode(&wire.raw_transaction)
            .map_err(|e| BuildError::Decode(format!("raw_transaction: {e}")))?;
        let transaction =
            Transaction::from_bytes(&raw).map_err(|e| BuildError::Decode(e.to_string()))?;

        let mut signing_instructions = Vec::with_capacity(wire.signing_instructions.len());
        for si in wire.signing_instructions {
            let mut witness_components = Vec::with_capacity(si.witness_components.len());
            for (index, component) in si.witness_components.into_iter().enumerate() {
                if component.kind != "signature" {
                    return Err(BuildError::BadWitnessComponent {
                        index,
                        kind: component.kind,
                    });
                }
                let decode = |s: &String, what: &str| {
                    hex::decode(s).map_err(|e| BuildError::Decode(format!("{what}: {e}")))
                };
                let mut keys = Vec::with_capacity(component.keys.len());
                for key in &component.keys {
                    let xpub_bytes = decode(&key.xpub, "xpub")?;
                    let xpub: [u8; 64] = xpub_bytes
                        .try_into()
                        .map_err(|_| BuildError::Decode("xpub length".to_string()))?;
                    let mut derivation_path = Vec::with_capacity(key.derivation_path.len());
                    for p in &key.derivation_path {
                        derivation_path.push(decode(p, "derivation_path")?);
                    }
                    keys.push(crate::witness::KeyId {
                        xpub: XPub(xpub),
                        derivation_path,
                    });
                }
                let program = decode(&component.program, "program")?;
                let mut sigs = Vec::with_capacity(component.sigs.len());
                for sig in &component.sigs {
                    sigs.push(decode(sig, "signature")?);
                }
                witness_components.push(WitnessComponent::Signature(SignatureWitness {
                    quorum: component.quorum,
                    keys,
                    program,
                    sigs,
                }));
            }
            signing_instructions.push(SigningInstruction {
                hash: si.hash,
                asset_amount: si.asset_amount,
                witness_components,
            });
        }

        Ok(Template {
            transaction,
            signing_instructions,
            ref_data: HashMap::new(),
            local: wire.local,
            allow_additional_actions: wire.allow_additional_actions,
        })
    }
}
