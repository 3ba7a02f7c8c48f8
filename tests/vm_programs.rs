//! Table-driven VM program tests over the assembly language, plus the
//! CHECKOUTPUT introspection scenarios.

mod common;

use txgraph::vm::assemble::assemble;
use txgraph::vm::types::int64_bytes;
use txgraph::vm::{eval, eval_with_tx, INITIAL_RUN_LIMIT};
use txgraph::VmError;

/// Programs that run without error and leave a true result.
#[test]
fn programs_ok() {
    let cases: &[(&str, &[&[u8]])] = &[
        ("TRUE", &[]),
        // bitwise
        ("INVERT 0xfef0 EQUAL", &[&[0x01, 0x0f]]),
        ("AND 0x02 EQUAL", &[&[0x03], &[0x06]]),
        ("AND 0x02 EQUAL", &[&[0x03, 0xff], &[0x06]]),
        ("OR 0x07 EQUAL", &[&[0x03], &[0x06]]),
        ("OR 0x07ff EQUAL", &[&[0x03, 0xff], &[0x06]]),
        ("XOR 0x05 EQUAL", &[&[0x03], &[0x06]]),
        ("XOR 0x05ff EQUAL", &[&[0x03, 0xff], &[0x06]]),
        // numeric and logical
        ("1 1ADD 2 NUMEQUAL", &[]),
        ("2 1SUB 1 NUMEQUAL", &[]),
        ("1 2MUL 2 NUMEQUAL", &[]),
        ("2 2DIV 1 NUMEQUAL", &[]),
        ("1 2DIV 0 NUMEQUAL", &[]),
        ("-1 2DIV -1 NUMEQUAL", &[]),
        ("1 NEGATE -1 NUMEQUAL", &[]),
        ("-1 ABS 1 NUMEQUAL", &[]),
        ("1 0NOTEQUAL", &[]),
        ("0 0NOTEQUAL NOT", &[]),
        ("2 3 ADD 5 NUMEQUAL", &[]),
        ("5 3 SUB 2 NUMEQUAL", &[]),
        ("2 3 MUL 6 NUMEQUAL", &[]),
        ("6 3 DIV 2 NUMEQUAL", &[]),
        ("6 2 MOD 0 NUMEQUAL", &[]),
        ("12 10 MOD 2 NUMEQUAL", &[]),
        ("-12 10 MOD 8 NUMEQUAL", &[]),
        ("12 -10 MOD -8 NUMEQUAL", &[]),
        ("-12 -10 MOD -2 NUMEQUAL", &[]),
        ("1 1 LSHIFT 2 NUMEQUAL", &[]),
        ("1 2 LSHIFT 4 NUMEQUAL", &[]),
        ("-1 1 LSHIFT -2 NUMEQUAL", &[]),
        ("4 1 RSHIFT 2 NUMEQUAL", &[]),
        ("1 1 BOOLAND", &[]),
        ("0 1 BOOLAND NOT", &[]),
        ("0 1 BOOLOR", &[]),
        ("0 0 BOOLOR NOT", &[]),
        ("1 2 LESSTHAN", &[]),
        ("2 1 GREATERTHAN", &[]),
        ("2 2 LESSTHANOREQUAL", &[]),
        ("2 2 GREATERTHANOREQUAL", &[]),
        ("1 2 MIN 1 NUMEQUAL", &[]),
        ("1 2 MAX 2 NUMEQUAL", &[]),
        ("2 1 5 WITHIN", &[]),
        ("5 1 5 WITHIN NOT", &[]),
        // stack
        ("1 DUP ADD 2 NUMEQUAL", &[]),
        ("1 2 SWAP DROP 2 NUMEQUAL", &[]),
        ("1 2 OVER DROP DROP 1 NUMEQUAL", &[]),
        ("1 2 3 2 PICK DROP DROP DROP 1 NUMEQUAL", &[]),
        ("1 2 3 2 ROLL 1 NUMEQUAL", &[]),
        ("7 TOALTSTACK FROMALTSTACK 7 NUMEQUAL", &[]),
        ("1 2 DEPTH 2 NUMEQUAL", &[]),
        // control flow
        ("TRUE FALSE IF FAIL ENDIF", &[]),
        ("FALSE IF FAIL ELSE TRUE ENDIF", &[]),
        ("TRUE TRUE NOTIF FAIL ENDIF", &[]),
        ("TRUE NOTIF FAIL ELSE TRUE ENDIF", &[]),
        ("1 IF 1 ENDIF", &[]),
        ("1 1 IF IF 1 ELSE 0 ENDIF ENDIF", &[]),
        ("1 0 IF IF 1 ELSE 0 ENDIF ENDIF", &[]),
        ("0 IF 1 IF FAIL ELSE FAIL ENDIF ELSE 1 ENDIF", &[]),
        // loops
        ("1 WHILE 0 ENDWHILE", &[]),
        ("1 WHILE NOT ENDWHILE 1", &[]),
        ("0 WHILE 0 ENDWHILE 1", &[]),
        ("17 FALSE TRUE TRUE TRUE WHILE DROP ENDWHILE 17 NUMEQUAL", &[]),
        ("0 1 WHILE DROP 1ADD DUP 10 LESSTHAN ENDWHILE 10 NUMEQUAL", &[]),
        ("1 WHILE WHILE 0 ENDWHILE 0 ENDWHILE 1", &[]),
    ];
    for (i, (src, args)) in cases.iter().enumerate() {
        let prog = assemble(src).unwrap_or_else(|e| panic!("case {i} [{src}]: {e}"));
        let args: Vec<Vec<u8>> = args.iter().map(|a| a.to_vec()).collect();
        assert_eq!(
            eval(&prog, &args, INITIAL_RUN_LIMIT),
            Ok(true),
            "case {i} [{src}]"
        );
    }
}

/// Programs that run without error and leave a false result.
#[test]
fn programs_not_ok() {
    let cases: &[&str] = &[
        "FALSE",
        "1 2 NUMEQUAL",
        "2 1 LESSTHAN",
        "1 2 GREATERTHAN",
        "1 0 BOOLAND",
        "0 0 BOOLOR",
        "0xaa 0xbb EQUAL",
    ];
    for (i, src) in cases.iter().enumerate() {
        let prog = assemble(src).unwrap();
        assert_eq!(eval(&prog, &[], INITIAL_RUN_LIMIT), Ok(false), "case {i} [{src}]");
    }
}

#[test]
fn programs_that_error() {
    let cases: &[(&str, VmError)] = &[
        ("ADD", VmError::DataStackUnderflow),
        ("TRUE IF", VmError::NonEmptyControlStack),
        ("ENDIF", VmError::ControlStackUnderflow),
        ("FALSE VERIFY", VmError::VerifyFailed),
        ("FAIL", VmError::Return),
        ("1 0 DIV", VmError::DivZero),
        ("1 0 MOD", VmError::DivZero),
        ("1 -1 LSHIFT", VmError::BadValue),
        ("OUTPUTID", VmError::Context),
    ];
    for (i, (src, want)) in cases.iter().enumerate() {
        let prog = assemble(src).unwrap();
        assert_eq!(
            eval(&prog, &[], INITIAL_RUN_LIMIT),
            Err(want.clone()),
            "case {i} [{src}]"
        );
    }
}

#[test]
fn overflow_errors_are_range() {
    let max = i64::MAX;
    let prog = {
        let mut b = txgraph::vmutil::Builder::new();
        b.add_int64(max);
        b.add_raw_bytes(&assemble("1ADD").unwrap());
        b.build()
    };
    assert_eq!(eval(&prog, &[], INITIAL_RUN_LIMIT), Err(VmError::Range));
}

#[test]
fn run_limit_exhaustion() {
    // An unbounded loop burns through any budget.
    let prog = assemble("1 WHILE 1 DROP ENDWHILE").unwrap();
    assert_eq!(
        eval(&prog, &[], INITIAL_RUN_LIMIT),
        Err(VmError::RunLimitExceeded)
    );
}

#[test]
fn checkoutput_matches_result_fields() {
    let tx = common::simple_tx(9, 1_000, 50_000);
    let input = tx.issuances()[0];

    // Push order: index, refdatahash, amount, asset, vmversion, code;
    // CHECKOUTPUT pops the code first.
    let mut b = txgraph::vmutil::Builder::new();
    b.add_int64(0);
    b.add_data(txgraph::Hash::ZERO.as_bytes());
    b.add_int64(10);
    b.add_data(&[9; 32]);
    b.add_int64(1);
    b.add_data(&[txgraph::vm::ops::OP_TRUE]);
    b.add_op(txgraph::vm::ops::OP_CHECKOUTPUT);
    assert_eq!(
        eval_with_tx(&tx, &input, &b.build(), &[], INITIAL_RUN_LIMIT),
        Ok(true)
    );

    // Wrong position: no result there.
    let mut b = txgraph::vmutil::Builder::new();
    b.add_int64(1);
    b.add_data(txgraph::Hash::ZERO.as_bytes());
    b.add_int64(10);
    b.add_data(&[9; 32]);
    b.add_int64(1);
    b.add_data(&[txgraph::vm::ops::OP_TRUE]);
    b.add_op(txgraph::vm::ops::OP_CHECKOUTPUT);
    assert_eq!(
        eval_with_tx(&tx, &input, &b.build(), &[], INITIAL_RUN_LIMIT),
        Ok(false)
    );
}

#[test]
fn checkoutput_retirement_carve_out() {
    use txgraph::vm::ops::{OP_FAIL, OP_TRUE};
    use txgraph::{AssetAmount, AssetId, Builder, Hash, Program};

    let value = AssetAmount {
        asset_id: AssetId([7; 32]),
        amount: 25,
    };
    let mut b = Builder::new(1, 0, 0, None);
    let tr = b.add_time_range(1, 10_000);
    let nonce = b.add_nonce(Program::new(1, vec![OP_TRUE]), tr);
    b.add_issuance(nonce, value, Hash::ZERO);
    b.add_retirement(value, Hash::ZERO);
    let tx = b.build();
    let input = tx.issuances()[0];

    // The one-byte FAIL program matches a retirement at the position.
    let mut prog = txgraph::vmutil::Builder::new();
    prog.add_int64(0);
    prog.add_data(Hash::ZERO.as_bytes());
    prog.add_int64(25);
    prog.add_data(&[7; 32]);
    prog.add_int64(1);
    prog.add_data(&[OP_FAIL]);
    prog.add_op(txgraph::vm::ops::OP_CHECKOUTPUT);
    assert_eq!(
        eval_with_tx(&tx, &input, &prog.build(), &[], INITIAL_RUN_LIMIT),
        Ok(true)
    );

    // Any other code against a retirement is false.
    let mut prog = txgraph::vmutil::Builder::new();
    prog.add_int64(0);
    prog.add_data(Hash::ZERO.as_bytes());
    prog.add_int64(25);
    prog.add_data(&[7; 32]);
    prog.add_int64(1);
    prog.add_data(&[OP_TRUE]);
    prog.add_op(txgraph::vm::ops::OP_CHECKOUTPUT);
    assert_eq!(
        eval_with_tx(&tx, &input, &prog.build(), &[], INITIAL_RUN_LIMIT),
        Ok(false)
    );
}

#[test]
fn determinism_includes_ending_run_limit() {
    let prog = assemble("0 1 WHILE DROP 1ADD DUP 10 LESSTHAN ENDWHILE 10 NUMEQUAL").unwrap();
    let run = |limit| {
        let mut vm = txgraph::vm::Vm::new(prog.clone(), limit);
        let result = vm.run();
        (result, vm.remaining_run_limit())
    };
    assert_eq!(run(10_000), run(10_000));
    let (result, remaining) = run(10_000);
    assert_eq!(result, Ok(true));
    assert!(remaining < 10_000);
}

#[test]
fn int64_literals_match_vm_encoding() {
    for n in [0i64, 1, 16, 17, -1, 300, i64::MAX] {
        let src = format!("{n} {n} NUMEQUAL");
        let prog = assemble(&src).unwrap();
        assert_eq!(eval(&prog, &[], INITIAL_RUN_LIMIT), Ok(true), "{n}");
    }
    assert_eq!(int64_bytes(0), Vec::<u8>::new());
}
