//! Assembler and disassembler for the opcode language.
//!
//! The assembly form exists for tests and error detail, never for
//! consensus: mnemonics without the `OP_` prefix, decimal int64
//! literals, and `0x…` hex data pushes, separated by whitespace.

use thiserror::Error;

use crate::vmutil::Builder;

use super::ops::{self, parse_op};
use super::types::as_int64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    #[error("unknown token {0:?}")]
    UnknownToken(String),

    #[error("bad hex literal {0:?}")]
    BadHex(String),
}

const MNEMONICS: &[(&str, u8)] = &[
    ("FALSE", ops::OP_FALSE),
    ("TRUE", ops::OP_TRUE),
    ("WHILE", ops::OP_WHILE),
    ("ENDWHILE", ops::OP_ENDWHILE),
    ("IF", ops::OP_IF),
    ("NOTIF", ops::OP_NOTIF),
    ("ELSE", ops::OP_ELSE),
    ("ENDIF", ops::OP_ENDIF),
    ("VERIFY", ops::OP_VERIFY),
    ("FAIL", ops::OP_FAIL),
    ("TOALTSTACK", ops::OP_TOALTSTACK),
    ("FROMALTSTACK", ops::OP_FROMALTSTACK),
    ("DEPTH", ops::OP_DEPTH),
    ("DROP", ops::OP_DROP),
    ("DUP", ops::OP_DUP),
    ("OVER", ops::OP_OVER),
    ("PICK", ops::OP_PICK),
    ("ROLL", ops::OP_ROLL),
    ("SWAP", ops::OP_SWAP),
    ("INVERT", ops::OP_INVERT),
    ("AND", ops::OP_AND),
    ("OR", ops::OP_OR),
    ("XOR", ops::OP_XOR),
    ("EQUAL", ops::OP_EQUAL),
    ("1ADD", ops::OP_1ADD),
    ("1SUB", ops::OP_1SUB),
    ("2MUL", ops::OP_2MUL),
    ("2DIV", ops::OP_2DIV),
    ("NEGATE", ops::OP_NEGATE),
    ("ABS", ops::OP_ABS),
    ("NOT", ops::OP_NOT),
    ("0NOTEQUAL", ops::OP_0NOTEQUAL),
    ("ADD", ops::OP_ADD),
    ("SUB", ops::OP_SUB),
    ("MUL", ops::OP_MUL),
    ("DIV", ops::OP_DIV),
    ("MOD", ops::OP_MOD),
    ("LSHIFT", ops::OP_LSHIFT),
    ("RSHIFT", ops::OP_RSHIFT),
    ("BOOLAND", ops::OP_BOOLAND),
    ("BOOLOR", ops::OP_BOOLOR),
    ("NUMEQUAL", ops::OP_NUMEQUAL),
    ("NUMNOTEQUAL", ops::OP_NUMNOTEQUAL),
    ("LESSTHAN", ops::OP_LESSTHAN),
    ("GREATERTHAN", ops::OP_GREATERTHAN),
    ("LESSTHANOREQUAL", ops::OP_LESSTHANOREQUAL),
    ("GREATERTHANOREQUAL", ops::OP_GREATERTHANOREQUAL),
    ("MIN", ops::OP_MIN),
    ("MAX", ops::OP_MAX),
    ("WITHIN", ops::OP_WITHIN),
    ("SHA3", ops::OP_SHA3),
    ("CHECKSIG", ops::OP_CHECKSIG),
    ("CHECKMULTISIG", ops::OP_CHECKMULTISIG),
    ("TXSIGHASH", ops::OP_TXSIGHASH),
    ("CHECKPREDICATE", ops::OP_CHECKPREDICATE),
    ("CHECKOUTPUT", ops::OP_CHECKOUTPUT),
    ("ASSET", ops::OP_ASSET),
    ("AMOUNT", ops::OP_AMOUNT),
    ("PROGRAM", ops::OP_PROGRAM),
    ("MINTIME", ops::OP_MINTIME),
    ("MAXTIME", ops::OP_MAXTIME),
    ("REFDATAHASH", ops::OP_REFDATAHASH),
    ("TXREFDATAHASH", ops::OP_TXREFDATAHASH),
    ("OUTPUTID", ops::OP_OUTPUTID),
    ("NONCE", ops::OP_NONCE),
    ("NEXTPROGRAM", ops::OP_NEXTPROGRAM),
    ("BLOCKTIME", ops::OP_BLOCKTIME),
];

fn op_for_name(name: &str) -> Option<u8> {
    MNEMONICS
        .iter()
        .find(|(mnemonic, _)| *mnemonic == name)
        .map(|(_, op)| *op)
}

fn name_for_op(op: u8) -> Option<&'static str> {
    // FALSE/TRUE alias OP_0/OP_1; first match wins for display.
    MNEMONICS
        .iter()
        .find(|(_, candidate)| *candidate == op)
        .map(|(name, _)| *name)
}

/// Assemble whitespace-separated tokens into bytecode.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssembleError> {
    let mut b = Builder::new();
    for token in source.split_whitespace() {
        if let Some(op) = op_for_name(token) {
            b.add_op(op);
        } else if let Some(hex_str) = token.strip_prefix("0x") {
            let data =
                hex::decode(hex_str).map_err(|_| AssembleError::BadHex(token.to_string()))?;
            b.add_data(&data);
        } else if let Ok(n) = token.parse::<i64>() {
            b.add_int64(n);
        } else {
            return Err(AssembleError::UnknownToken(token.to_string()));
        }
    }
    Ok(b.build())
}

/// Render bytecode as assembly text. Pushes become hex or small-int
/// literals; unknown bytes render as `NONSTANDARD(0x…)`.
pub fn disassemble(program: &[u8]) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut pc = 0;
    while pc < program.len() {
        match parse_op(program, pc) {
            Ok(inst) => {
                if inst.data_len > 0 || inst.op == ops::OP_0 {
                    let data = &program[inst.data_start..inst.data_start + inst.data_len];
                    match as_int64(data) {
                        Ok(n) if data.len() <= 2 => out.push(n.to_string()),
                        _ => out.push(format!("0x{}", hex::encode(data))),
                    }
                } else if (ops::OP_1..=ops::OP_16).contains(&inst.op) {
                    out.push(((inst.op - ops::OP_N_BASE) as i64).to_string());
                } else if inst.op == ops::OP_1NEGATE {
                    out.push("-1".to_string());
                } else if let Some(name) = name_for_op(inst.op) {
                    out.push(name.to_string());
                } else {
                    out.push(format!("NONSTANDARD(0x{:02x})", inst.op));
                }
                pc += inst.len;
            }
            Err(_) => {
                out.push(format!("TRUNCATED(0x{:02x})", program[pc]));
                break;
            }
        }
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::super::{eval, INITIAL_RUN_LIMIT};
    use super::*;

    #[test]
    fn assemble_mnemonics_and_literals() {
        let prog = assemble("2 3 ADD 5 NUMEQUAL").unwrap();
        assert_eq!(eval(&prog, &[], INITIAL_RUN_LIMIT), Ok(true));
    }

    #[test]
    fn assemble_hex_data() {
        let prog = assemble("0xbeef 0xbeef EQUAL").unwrap();
        assert_eq!(eval(&prog, &[], INITIAL_RUN_LIMIT), Ok(true));
    }

    #[test]
    fn unknown_token_rejected() {
        assert_eq!(
            assemble("FROBNICATE"),
            Err(AssembleError::UnknownToken("FROBNICATE".to_string()))
        );
        assert!(matches!(assemble("0xzz"), Err(AssembleError::BadHex(_))));
    }

    #[test]
    fn disassemble_reads_back() {
        let prog = assemble("DUP SHA3 0xdeadbeef EQUAL VERIFY TRUE").unwrap();
        let text = disassemble(&prog);
        assert_eq!(text, "DUP SHA3 0xdeadbeef EQUAL VERIFY 1");
        // Reassembling the disassembly gives back the same bytes.
        assert_eq!(assemble(&text).unwrap(), prog);
    }
}
