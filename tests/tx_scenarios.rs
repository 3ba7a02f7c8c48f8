//! End-to-end transaction scenarios: issue, confirm, apply, and the
//! failure modes around balance and replay.

mod common;

use txgraph::{
    apply_tx, check_tx_well_formed, confirm_tx, BadTxReason, Hash, MemSnapshot, Snapshot,
    Template, ValidationError,
};

use common::{issuance_template, signer_for, test_key};

const NOW_MS: u64 = 1_500_000_000_000;

fn signed_issuance(seed: u8, initial_block_id: Hash) -> (Template, Hash) {
    let key = test_key(seed);
    let fixture = issuance_template(&key, initial_block_id, NOW_MS);
    let mut template = fixture.template;
    let mut signer = signer_for(vec![test_key(seed)]);
    template.sign(&[key.xpub], &mut signer).unwrap();
    (template, fixture.issuance_id)
}

#[test]
fn issue_and_output_full_lifecycle() {
    let initial_block_id = Hash::ZERO;
    let (template, _) = signed_issuance(1, initial_block_id);
    let tx = template.transaction;

    assert_eq!(check_tx_well_formed(&tx, None), Ok(()));

    let mut snapshot = MemSnapshot::new();
    assert_eq!(
        confirm_tx(&snapshot, &initial_block_id, 1, NOW_MS, &tx),
        Ok(())
    );
    assert_eq!(apply_tx(&mut snapshot, &tx), Ok(()));
    assert!(snapshot.contains(&tx.outputs()[0]));
}

#[test]
fn transaction_id_is_deterministic() {
    let key = test_key(1);
    let a = issuance_template(&key, Hash::ZERO, NOW_MS);
    let b = issuance_template(&key, Hash::ZERO, NOW_MS);
    assert_eq!(a.template.transaction.id(), b.template.transaction.id());
    assert_eq!(a.asset_id, b.asset_id);

    // Signing fills witnesses only; the id must not move.
    let (signed, _) = signed_issuance(1, Hash::ZERO);
    assert_eq!(signed.transaction.id(), a.template.transaction.id());
}

#[test]
fn unbalanced_output_rejected() {
    let tx = {
        use txgraph::vm::ops::OP_TRUE;
        use txgraph::{AssetAmount, AssetId, Builder, Program};
        let mut b = Builder::new(1, 0, 0, None);
        let tr = b.add_time_range(1, 10_000);
        let nonce = b.add_nonce(Program::new(1, vec![OP_TRUE]), tr);
        let asset_id = AssetId([1; 32]);
        let iss = b.add_issuance(
            nonce,
            AssetAmount {
                asset_id,
                amount: 100,
            },
            Hash::ZERO,
        );
        b.set_issuance_witness(&iss, Hash::ZERO, Hash::ZERO, Program::new(1, vec![OP_TRUE]));
        b.add_output(
            AssetAmount {
                asset_id,
                amount: 99,
            },
            Program::new(1, vec![0xbe, 0xef]),
            Hash::ZERO,
        );
        b.build()
    };
    assert!(matches!(
        check_tx_well_formed(&tx, None),
        Err(ValidationError::BadTx(BadTxReason::UnbalancedV1 { .. }))
    ));
}

#[test]
fn input_sum_overflow_rejected() {
    use txgraph::vm::ops::OP_TRUE;
    use txgraph::{AssetAmount, AssetId, Builder, Program};

    let huge = (1u64 << 62) + 1;
    let asset_id = AssetId([1; 32]);
    let mut b = Builder::new(1, 0, 0, None);
    for seed in [1u64, 2] {
        let tr = b.add_time_range(seed, 10_000);
        let nonce = b.add_nonce(Program::new(1, vec![OP_TRUE]), tr);
        let iss = b.add_issuance(
            nonce,
            AssetAmount {
                asset_id,
                amount: huge,
            },
            Hash::ZERO,
        );
        b.set_issuance_witness(&iss, Hash::ZERO, Hash::ZERO, Program::new(1, vec![OP_TRUE]));
    }
    b.add_output(
        AssetAmount {
            asset_id,
            amount: 1,
        },
        Program::new(1, vec![OP_TRUE]),
        Hash::ZERO,
    );
    let tx = b.build();
    assert!(matches!(
        check_tx_well_formed(&tx, None),
        Err(ValidationError::BadTx(BadTxReason::InputSumTooBig { .. }))
    ));
}

#[test]
fn double_issuance_rejected_on_second_confirm() {
    let initial_block_id = Hash::ZERO;
    let (template, _) = signed_issuance(1, initial_block_id);
    let tx = template.transaction;

    let mut snapshot = MemSnapshot::new();
    assert_eq!(
        confirm_tx(&snapshot, &initial_block_id, 1, NOW_MS, &tx),
        Ok(())
    );
    apply_tx(&mut snapshot, &tx).unwrap();

    assert_eq!(
        confirm_tx(&snapshot, &initial_block_id, 1, NOW_MS, &tx),
        Err(ValidationError::BadTx(BadTxReason::DuplicateIssuance))
    );
}

#[test]
fn issuance_memory_expires_with_its_anchor_window() {
    let initial_block_id = Hash::ZERO;
    let (template, issuance_id) = signed_issuance(1, initial_block_id);
    let tx = template.transaction;

    let mut snapshot = MemSnapshot::new();
    apply_tx(&mut snapshot, &tx).unwrap();
    assert!(snapshot.contains_issuance(&issuance_id));

    // The anchor's window ends at NOW + 5min; pruning past it forgets
    // the issuance.
    snapshot.prune_issuances(NOW_MS + 600_000);
    assert!(!snapshot.contains_issuance(&issuance_id));
}

#[test]
fn wrong_chain_rejected() {
    let genesis = txgraph::types::sha3_256(&[b"other chain"]);
    let (template, _) = signed_issuance(1, Hash::ZERO);
    let tx = template.transaction;

    let snapshot = MemSnapshot::new();
    assert_eq!(
        confirm_tx(&snapshot, &genesis, 1, NOW_MS, &tx),
        Err(ValidationError::BadTx(BadTxReason::WrongBlockchain))
    );
}

#[test]
fn prevout_spend_survives_the_wire() {
    use txgraph::vm::ops::OP_TRUE;
    use txgraph::{AssetAmount, AssetId, Builder, Prevout, Program, Transaction};

    let value = AssetAmount {
        asset_id: AssetId([8; 32]),
        amount: 40,
    };
    let output_id = txgraph::types::sha3_256(&[b"output known only by id"]);
    let prevout = Prevout {
        value,
        program: Program::new(1, vec![OP_TRUE]),
    };

    let mut b = Builder::new(1, 0, 0, None);
    let spend_id = b.add_prevout_spend(output_id, prevout.clone(), Hash::ZERO);
    b.add_output(value, Program::new(1, vec![OP_TRUE]), Hash::ZERO);
    let tx = b.build();
    assert_eq!(check_tx_well_formed(&tx, None), Ok(()));

    // Binary wire: the spent output entry is absent, so the spend's
    // value and control program must come from the prevout record.
    let decoded = Transaction::from_bytes(&tx.to_bytes()).unwrap();
    assert_eq!(decoded.id(), tx.id());
    let spend = decoded.spend_entry(&spend_id).unwrap();
    assert_eq!(decoded.spend_asset_amount(spend), Some(value));
    assert_eq!(
        decoded.spend_control_program(spend).map(|p| p.code.clone()),
        Some(vec![OP_TRUE])
    );
    assert_eq!(check_tx_well_formed(&decoded, None), Ok(()));

    // Template JSON, the designated path for spends whose output only
    // the counterparty knows.
    let mut tb = txgraph::TemplateBuilder::new(None, 10_000);
    tb.add_prevout_spend(output_id, prevout, Hash::ZERO, None)
        .unwrap();
    tb.add_output(value, Program::new(1, vec![OP_TRUE]), Hash::ZERO)
        .unwrap();
    let template = tb.build().unwrap();
    let received = Template::from_json(&template.to_json()).unwrap();
    let spend = received.transaction.spend_entry(&spend_id).unwrap();
    assert_eq!(received.transaction.spend_asset_amount(spend), Some(value));
}

#[test]
fn spend_requires_snapshot_presence() {
    use txgraph::vm::ops::OP_TRUE;
    use txgraph::{AssetAmount, AssetId, Builder, Program};
    use txgraph::entry::{Output, ValueSource};

    let value = AssetAmount {
        asset_id: AssetId([3; 32]),
        amount: 10,
    };
    let prevout = Output::new(
        ValueSource {
            ref_id: txgraph::types::sha3_256(&[b"older tx mux"]),
            value,
            position: 0,
        },
        Program::new(1, vec![OP_TRUE]),
        Hash::ZERO,
    );

    let mut b = Builder::new(1, 0, 0, None);
    let spend_id = b.add_full_spend(prevout.clone(), Hash::ZERO);
    b.add_output(value, Program::new(1, vec![OP_TRUE]), Hash::ZERO);
    let tx = b.build();
    assert_eq!(check_tx_well_formed(&tx, None), Ok(()));

    let spent_output_id = match tx.entry(&spend_id).unwrap() {
        txgraph::Entry::Spend(sp) => sp.body.spent_output,
        _ => unreachable!(),
    };

    let mut snapshot = MemSnapshot::new();
    assert!(matches!(
        confirm_tx(&snapshot, &Hash::ZERO, 1, NOW_MS, &tx),
        Err(ValidationError::BadTx(BadTxReason::InvalidOutput { .. }))
    ));

    snapshot.insert(&spent_output_id);
    assert_eq!(confirm_tx(&snapshot, &Hash::ZERO, 1, NOW_MS, &tx), Ok(()));

    apply_tx(&mut snapshot, &tx).unwrap();
    assert!(!snapshot.contains(&spent_output_id));
    assert!(snapshot.contains(&tx.outputs()[0]));
}
