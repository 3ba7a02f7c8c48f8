//! Shared fixtures: deterministic test keys, a signer callback, and an
//! issue-to-output transaction generator.
#![allow(dead_code)]

use ed25519_dalek::{Signer as _, SigningKey};
use txgraph::vm::ops::OP_TRUE;
use txgraph::{
    compute_asset_id, vmutil, AssetAmount, Builder, Hash, Program, SigningInstruction, Template,
    TemplateBuilder, XPub,
};

pub struct TestKey {
    pub xpub: XPub,
    pub pubkey: [u8; 32],
    signing: SigningKey,
}

/// A deterministic key whose xpub carries the verifying key in its
/// first half, the way the test signer expects.
pub fn test_key(seed: u8) -> TestKey {
    let signing = SigningKey::from_bytes(&[seed; 32]);
    let pubkey = signing.verifying_key().to_bytes();
    let mut xpub = [0u8; 64];
    xpub[..32].copy_from_slice(&pubkey);
    xpub[32..].copy_from_slice(&[seed; 32]);
    TestKey {
        xpub: XPub(xpub),
        pubkey,
        signing,
    }
}

/// Signer callback over a fixed key set. Ignores the derivation path:
/// key derivation is outside the engine.
pub fn signer_for(
    keys: Vec<TestKey>,
) -> impl FnMut(&XPub, &[Vec<u8>], &Hash) -> Result<Vec<u8>, String> {
    move |xpub, _path, h| {
        let key = keys
            .iter()
            .find(|k| k.xpub == *xpub)
            .ok_or_else(|| "unknown xpub".to_string())?;
        Ok(key.signing.sign(h.as_bytes()).to_bytes().to_vec())
    }
}

pub struct IssuanceFixture {
    pub template: Template,
    pub issuance_id: Hash,
    pub asset_id: txgraph::AssetId,
}

/// Build a template issuing 100 units of a fresh asset to the 0xbeef
/// control program, guarded by a single-key signature program, with the
/// issuance anchored at a nonce valid in [t - 5min, t + 5min].
pub fn issuance_template(key: &TestKey, initial_block_id: Hash, now_ms: u64) -> IssuanceFixture {
    let issuance_program = Program::new(
        1,
        vmutil::p2sp_multisig_program(&[key.pubkey], 1).unwrap(),
    );
    let asset_definition_hash = Hash::ZERO;
    let asset_id = compute_asset_id(&issuance_program, &initial_block_id, &asset_definition_hash);
    let value = AssetAmount {
        asset_id,
        amount: 100,
    };

    let mut b = TemplateBuilder::new(None, now_ms + 300_000);
    let tr = b.add_time_range(now_ms.saturating_sub(300_000), now_ms + 300_000);
    let nonce = b.add_nonce(Program::new(1, vec![OP_TRUE]), tr);
    let mut instruction = SigningInstruction::new(Hash::ZERO, value);
    instruction.add_witness_keys(
        txgraph::key_ids(&[key.xpub], &[b"fixture".to_vec()]),
        1,
    );
    let issuance_id = b
        .add_issuance(nonce, value, Hash::ZERO, Some(instruction))
        .unwrap();
    b.set_issuance_witness(
        &issuance_id,
        initial_block_id,
        asset_definition_hash,
        issuance_program,
    );
    b.add_output(value, Program::new(1, vec![0xbe, 0xef]), Hash::ZERO)
        .unwrap();

    let template = b.build().expect("fixture template builds");
    IssuanceFixture {
        template,
        issuance_id,
        asset_id,
    }
}

/// A balanced issue-and-output transaction authorized by OP_TRUE,
/// distinct per tag.
pub fn simple_tx(tag: u8, min_ms: u64, max_ms: u64) -> txgraph::Transaction {
    let mut b = Builder::new(1, min_ms, max_ms, None);
    let tr = b.add_time_range(min_ms.max(1), max_ms + 10_000);
    let nonce = b.add_nonce(Program::new(1, vec![OP_TRUE]), tr);
    let value = AssetAmount {
        asset_id: txgraph::AssetId([tag; 32]),
        amount: 10,
    };
    let iss = b.add_issuance(nonce, value, Hash::ZERO);
    b.set_issuance_witness(&iss, Hash::ZERO, Hash::ZERO, Program::new(1, vec![OP_TRUE]));
    b.add_output(value, Program::new(1, vec![OP_TRUE]), Hash::ZERO);
    b.build()
}
