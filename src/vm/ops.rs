//! Opcode constants, instruction parsing, and the stack, numeric,
//! bitwise, and control-flow opcode implementations.
//!
//! Opcode values 0x01 through 0x4b push that many literal bytes; the
//! PUSHDATA family carries an explicit little-endian length. The rest of
//! the table is grouped by family, with each constant's fixed cost noted
//! in its implementation.

use crate::error::VmError;

use super::types::as_bool;
use super::{ControlOp, ControlTuple, Vm};

// ============================================================================
// PUSH OPCODES (0x00 - 0x60)
// ============================================================================

/// OP_0 / OP_FALSE - Push the empty string
pub const OP_0: u8 = 0x00;
pub const OP_FALSE: u8 = 0x00;

/// OP_DATA_32 - Push the next 32 bytes (the shape FinalizeTx looks for
/// at the front of a tx-sighash program)
pub const OP_DATA_32: u8 = 0x20;

/// Largest direct data push (75 bytes)
pub const OP_DATA_75: u8 = 0x4b;

/// OP_PUSHDATA1 - Push data with a 1-byte length prefix
pub const OP_PUSHDATA1: u8 = 0x4c;

/// OP_PUSHDATA2 - Push data with a 2-byte little-endian length prefix
pub const OP_PUSHDATA2: u8 = 0x4d;

/// OP_PUSHDATA4 - Push data with a 4-byte little-endian length prefix
pub const OP_PUSHDATA4: u8 = 0x4e;

/// OP_1NEGATE - Push the number -1
pub const OP_1NEGATE: u8 = 0x4f;

/// OP_1 / OP_TRUE - Push the number 1
pub const OP_1: u8 = 0x51;
pub const OP_TRUE: u8 = 0x51;

/// Base for the small-integer opcodes: OP_N pushes N = opcode - OP_N_BASE
pub const OP_N_BASE: u8 = 0x50;

/// OP_2 - Push the number 2
pub const OP_2: u8 = OP_N_BASE + 2;

/// OP_3 - Push the number 3
pub const OP_3: u8 = OP_N_BASE + 3;

/// OP_16 - Push the number 16 (OP_4 through OP_15 sit in between)
pub const OP_16: u8 = 0x60;

// ============================================================================
// CONTROL FLOW (0x61 - 0x6a)
// ============================================================================

/// OP_WHILE - Loop while the top of stack is true (peeked, not popped;
/// the false that ends the loop is popped)
pub const OP_WHILE: u8 = 0x61;

/// OP_ENDWHILE - End of a WHILE body; jumps back to the WHILE
pub const OP_ENDWHILE: u8 = 0x62;

/// OP_IF - Execute the branch if the popped condition is true
pub const OP_IF: u8 = 0x63;

/// OP_NOTIF - Execute the branch if the popped condition is false
pub const OP_NOTIF: u8 = 0x64;

/// OP_ELSE - Alternate branch of an IF/NOTIF
pub const OP_ELSE: u8 = 0x67;

/// OP_ENDIF - End of an IF/NOTIF
pub const OP_ENDIF: u8 = 0x68;

/// OP_VERIFY - Fail the program unless the popped value is true
pub const OP_VERIFY: u8 = 0x69;

/// OP_FAIL - Fail the program unconditionally
pub const OP_FAIL: u8 = 0x6a;

// ============================================================================
// STACK (0x6b - 0x7c)
// ============================================================================

/// OP_TOALTSTACK - Move the top item to the alt stack
pub const OP_TOALTSTACK: u8 = 0x6b;

/// OP_FROMALTSTACK - Move the top alt-stack item back
pub const OP_FROMALTSTACK: u8 = 0x6c;

/// OP_DEPTH - Push the data stack depth
pub const OP_DEPTH: u8 = 0x74;

/// OP_DROP - Remove the top item
pub const OP_DROP: u8 = 0x75;

/// OP_DUP - Duplicate the top item
pub const OP_DUP: u8 = 0x76;

/// OP_OVER - Copy the second item to the top
pub const OP_OVER: u8 = 0x78;

/// OP_PICK - Copy the item n back to the top
pub const OP_PICK: u8 = 0x79;

/// OP_ROLL - Move the item n back to the top
pub const OP_ROLL: u8 = 0x7a;

/// OP_SWAP - Swap the top two items
pub const OP_SWAP: u8 = 0x7c;

// ============================================================================
// BITWISE AND BYTE-STRING COMPARISON (0x83 - 0x87)
// ============================================================================

/// OP_INVERT - Flip every bit of the top item
pub const OP_INVERT: u8 = 0x83;

/// OP_AND - Bitwise AND, truncating to the shorter operand
pub const OP_AND: u8 = 0x84;

/// OP_OR - Bitwise OR, extending to the longer operand
pub const OP_OR: u8 = 0x85;

/// OP_XOR - Bitwise XOR, extending to the longer operand
pub const OP_XOR: u8 = 0x86;

/// OP_EQUAL - Push whether the top two items are byte-identical
pub const OP_EQUAL: u8 = 0x87;

// ============================================================================
// NUMERIC (0x8b - 0xa5)
// ============================================================================

/// OP_1ADD - Add 1
pub const OP_1ADD: u8 = 0x8b;

/// OP_1SUB - Subtract 1
pub const OP_1SUB: u8 = 0x8c;

/// OP_2MUL - Multiply by 2
pub const OP_2MUL: u8 = 0x8d;

/// OP_2DIV - Arithmetic shift right by one (rounds toward -inf)
pub const OP_2DIV: u8 = 0x8e;

/// OP_NEGATE - Flip the sign
pub const OP_NEGATE: u8 = 0x8f;

/// OP_ABS - Absolute value
pub const OP_ABS: u8 = 0x90;

/// OP_NOT - 1 if the input is 0, else 0
pub const OP_NOT: u8 = 0x91;

/// OP_0NOTEQUAL - 0 if the input is 0, else 1
pub const OP_0NOTEQUAL: u8 = 0x92;

/// OP_ADD - a + b
pub const OP_ADD: u8 = 0x93;

/// OP_SUB - a - b
pub const OP_SUB: u8 = 0x94;

/// OP_MUL - a * b
pub const OP_MUL: u8 = 0x95;

/// OP_DIV - Floored division
pub const OP_DIV: u8 = 0x96;

/// OP_MOD - Floored remainder (sign of the divisor)
pub const OP_MOD: u8 = 0x97;

/// OP_LSHIFT - a shifted left b bits
pub const OP_LSHIFT: u8 = 0x98;

/// OP_RSHIFT - a shifted right b bits, preserving sign
pub const OP_RSHIFT: u8 = 0x99;

/// OP_BOOLAND - 1 if both inputs are nonzero
pub const OP_BOOLAND: u8 = 0x9a;

/// OP_BOOLOR - 1 if either input is nonzero
pub const OP_BOOLOR: u8 = 0x9b;

/// OP_NUMEQUAL - 1 if the numbers are equal
pub const OP_NUMEQUAL: u8 = 0x9c;

/// OP_NUMNOTEQUAL - 1 if the numbers differ
pub const OP_NUMNOTEQUAL: u8 = 0x9e;

/// OP_LESSTHAN - 1 if a < b
pub const OP_LESSTHAN: u8 = 0x9f;

/// OP_GREATERTHAN - 1 if a > b
pub const OP_GREATERTHAN: u8 = 0xa0;

/// OP_LESSTHANOREQUAL - 1 if a <= b
pub const OP_LESSTHANOREQUAL: u8 = 0xa1;

/// OP_GREATERTHANOREQUAL - 1 if a >= b
pub const OP_GREATERTHANOREQUAL: u8 = 0xa2;

/// OP_MIN - The smaller of a and b
pub const OP_MIN: u8 = 0xa3;

/// OP_MAX - The larger of a and b
pub const OP_MAX: u8 = 0xa4;

/// OP_WITHIN - 1 if min <= x < max
pub const OP_WITHIN: u8 = 0xa5;

// ============================================================================
// CRYPTO (0xaa - 0xaf)
// ============================================================================

/// OP_SHA3 - SHA3-256 of the top item
pub const OP_SHA3: u8 = 0xaa;

/// OP_CHECKSIG - Verify an Ed25519 signature over a 32-byte message
pub const OP_CHECKSIG: u8 = 0xac;

/// OP_CHECKMULTISIG - Verify a quorum of Ed25519 signatures, in key order
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// OP_TXSIGHASH - Push the current input's transaction signature hash
pub const OP_TXSIGHASH: u8 = 0xaf;

// ============================================================================
// PREDICATES AND INTROSPECTION (0xc0 - 0xcc)
// ============================================================================

/// OP_CHECKPREDICATE - Run a popped program in a child VM over the top
/// N stack items, within a bounded sub-run-limit
pub const OP_CHECKPREDICATE: u8 = 0xc0;

/// OP_CHECKOUTPUT - Check a result at a mux position against
/// (refdatahash, amount, asset, vmversion, code)
pub const OP_CHECKOUTPUT: u8 = 0xc1;

/// OP_ASSET - Asset id of the current input
pub const OP_ASSET: u8 = 0xc2;

/// OP_AMOUNT - Amount of the current input
pub const OP_AMOUNT: u8 = 0xc3;

/// OP_PROGRAM - The program currently being executed at the top level
pub const OP_PROGRAM: u8 = 0xc4;

/// OP_MINTIME - The transaction's minimum time
pub const OP_MINTIME: u8 = 0xc5;

/// OP_MAXTIME - The transaction's maximum time (0 clamps to i64::MAX)
pub const OP_MAXTIME: u8 = 0xc6;

/// OP_REFDATAHASH - The current input's reference data hash
pub const OP_REFDATAHASH: u8 = 0xc7;

/// OP_TXREFDATAHASH - The transaction's reference data hash
pub const OP_TXREFDATAHASH: u8 = 0xc8;

/// OP_OUTPUTID - The spent output id (spends only)
pub const OP_OUTPUTID: u8 = 0xc9;

/// OP_NONCE - The issuance anchor id (issuances only)
pub const OP_NONCE: u8 = 0xca;

/// OP_NEXTPROGRAM - The next consensus program (block context only)
pub const OP_NEXTPROGRAM: u8 = 0xcb;

/// OP_BLOCKTIME - The block timestamp (block context only)
pub const OP_BLOCKTIME: u8 = 0xcc;

/// A parsed instruction: opcode, total encoded length, and the
/// position of any push payload inside the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: u8,
    pub len: usize,
    pub data_start: usize,
    pub data_len: usize,
}

/// Parse the instruction at `pc`. Pushes that run past the end of the
/// program are an error.
pub fn parse_op(program: &[u8], pc: usize) -> Result<Instruction, VmError> {
    let op = program[pc];
    let mut inst = Instruction {
        op,
        len: 1,
        data_start: pc + 1,
        data_len: 0,
    };
    match op {
        0x01..=OP_DATA_75 => {
            inst.data_len = op as usize;
            inst.len = 1 + inst.data_len;
        }
        OP_PUSHDATA1 => {
            let n = *program.get(pc + 1).ok_or(VmError::UnexpectedEnd)? as usize;
            inst.data_start = pc + 2;
            inst.data_len = n;
            inst.len = 2 + n;
        }
        OP_PUSHDATA2 => {
            let bytes = program.get(pc + 1..pc + 3).ok_or(VmError::UnexpectedEnd)?;
            let n = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
            inst.data_start = pc + 3;
            inst.data_len = n;
            inst.len = 3 + n;
        }
        OP_PUSHDATA4 => {
            let bytes = program.get(pc + 1..pc + 5).ok_or(VmError::UnexpectedEnd)?;
            let n = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
            inst.data_start = pc + 5;
            inst.data_len = n;
            inst.len = 5 + n;
        }
        _ => {}
    }
    if inst.data_start + inst.data_len > program.len() {
        return Err(VmError::UnexpectedEnd);
    }
    Ok(inst)
}

/// Control-flow opcodes run even inside a skipped branch, so that
/// nesting stays matched.
pub fn is_control_op(op: u8) -> bool {
    matches!(
        op,
        OP_WHILE | OP_ENDWHILE | OP_IF | OP_NOTIF | OP_ELSE | OP_ENDIF
    )
}

// --- pushes ---

pub(super) fn op_pushdata(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    let data = vm.data.clone();
    vm.push(data, false)
}

pub(super) fn op_1negate(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    vm.push_int64(-1, false)
}

pub(super) fn op_push_small(vm: &mut Vm, n: i64) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    vm.push_int64(n, false)
}

// --- control flow ---

pub(super) fn op_if(vm: &mut Vm, negate: bool) -> Result<(), VmError> {
    let flag = if vm.should_exec() {
        vm.apply_cost(4)?;
        let cond = vm.pop(true)?;
        as_bool(&cond) != negate
    } else {
        vm.apply_cost(1)?;
        false
    };
    vm.control_stack.push(ControlTuple {
        op: ControlOp::If,
        flag,
        pc: vm.pc,
    });
    Ok(())
}

pub(super) fn op_else(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    match vm.control_stack.last_mut() {
        Some(tuple) if tuple.op == ControlOp::If => {
            tuple.flag = !tuple.flag;
            Ok(())
        }
        Some(_) => Err(VmError::BadValue),
        None => Err(VmError::ControlStackUnderflow),
    }
}

pub(super) fn op_endif(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    match vm.control_stack.pop() {
        Some(tuple) if tuple.op == ControlOp::If => Ok(()),
        Some(_) => Err(VmError::BadValue),
        None => Err(VmError::ControlStackUnderflow),
    }
}

pub(super) fn op_while(vm: &mut Vm) -> Result<(), VmError> {
    let flag = if vm.should_exec() {
        vm.apply_cost(4)?;
        // Peek: a true condition stays for the body to consume; the
        // false that ends the loop is popped here.
        let keep_going = as_bool(vm.top()?);
        if !keep_going {
            vm.pop(true)?;
        }
        keep_going
    } else {
        vm.apply_cost(1)?;
        false
    };
    vm.control_stack.push(ControlTuple {
        op: ControlOp::While,
        flag,
        pc: vm.pc,
    });
    Ok(())
}

pub(super) fn op_endwhile(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    match vm.control_stack.pop() {
        Some(tuple) if tuple.op == ControlOp::While => {
            if tuple.flag {
                vm.next_pc = tuple.pc;
            }
            Ok(())
        }
        Some(_) => Err(VmError::BadValue),
        None => Err(VmError::ControlStackUnderflow),
    }
}

pub(super) fn op_verify(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    let top = vm.pop(true)?;
    if as_bool(&top) {
        Ok(())
    } else {
        Err(VmError::VerifyFailed)
    }
}

pub(super) fn op_fail(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    Err(VmError::Return)
}

// --- stack ---

pub(super) fn op_toaltstack(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(2)?;
    let item = vm.data_stack.pop().ok_or(VmError::DataStackUnderflow)?;
    vm.alt_stack.push(item);
    Ok(())
}

pub(super) fn op_fromaltstack(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(2)?;
    let item = vm.alt_stack.pop().ok_or(VmError::AltStackUnderflow)?;
    vm.data_stack.push(item);
    Ok(())
}

pub(super) fn op_depth(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    let depth = vm.data_stack.len() as i64;
    vm.push_int64(depth, true)
}

pub(super) fn op_drop(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    vm.pop(true)?;
    Ok(())
}

pub(super) fn op_dup(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    let top = vm.top()?.to_vec();
    vm.push(top, true)
}

pub(super) fn op_over(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    let len = vm.data_stack.len();
    if len < 2 {
        return Err(VmError::DataStackUnderflow);
    }
    let item = vm.data_stack[len - 2].clone();
    vm.push(item, true)
}

fn stack_index(vm: &Vm, n: i64) -> Result<usize, VmError> {
    if n < 0 {
        return Err(VmError::BadValue);
    }
    let len = vm.data_stack.len();
    if n as usize >= len {
        return Err(VmError::DataStackUnderflow);
    }
    Ok(len - 1 - n as usize)
}

pub(super) fn op_pick(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(2)?;
    let n = vm.pop_int64(true)?;
    let idx = stack_index(vm, n)?;
    let item = vm.data_stack[idx].clone();
    vm.push(item, true)
}

pub(super) fn op_roll(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(2)?;
    let n = vm.pop_int64(true)?;
    let idx = stack_index(vm, n)?;
    let item = vm.data_stack.remove(idx);
    vm.data_stack.push(item);
    Ok(())
}

pub(super) fn op_swap(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(2)?;
    let len = vm.data_stack.len();
    if len < 2 {
        return Err(VmError::DataStackUnderflow);
    }
    vm.data_stack.swap(len - 1, len - 2);
    Ok(())
}

// --- bitwise ---

pub(super) fn op_invert(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    let mut item = vm.pop(true)?;
    for byte in &mut item {
        *byte = !*byte;
    }
    vm.push(item, true)
}

fn binary_bytes(vm: &mut Vm) -> Result<(Vec<u8>, Vec<u8>), VmError> {
    let b = vm.pop(true)?;
    let a = vm.pop(true)?;
    Ok((a, b))
}

pub(super) fn op_and(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    let (a, b) = binary_bytes(vm)?;
    let out: Vec<u8> = a.iter().zip(b.iter()).map(|(x, y)| x & y).collect();
    vm.push(out, true)
}

fn zip_extended(a: &[u8], b: &[u8], f: impl Fn(u8, u8) -> u8) -> Vec<u8> {
    let longest = a.len().max(b.len());
    (0..longest)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            f(x, y)
        })
        .collect()
}

pub(super) fn op_or(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    let (a, b) = binary_bytes(vm)?;
    vm.push(zip_extended(&a, &b, |x, y| x | y), true)
}

pub(super) fn op_xor(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    let (a, b) = binary_bytes(vm)?;
    vm.push(zip_extended(&a, &b, |x, y| x ^ y), true)
}

pub(super) fn op_equal(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(1)?;
    let (a, b) = binary_bytes(vm)?;
    vm.push_bool(a == b, true)
}

// --- numeric ---

fn unary_int(vm: &mut Vm, f: impl Fn(i64) -> Result<i64, VmError>) -> Result<(), VmError> {
    vm.apply_cost(2)?;
    let n = vm.pop_int64(true)?;
    let out = f(n)?;
    vm.push_int64(out, true)
}

fn binary_int(vm: &mut Vm, f: impl Fn(i64, i64) -> Result<i64, VmError>) -> Result<(), VmError> {
    vm.apply_cost(2)?;
    let b = vm.pop_int64(true)?;
    let a = vm.pop_int64(true)?;
    let out = f(a, b)?;
    vm.push_int64(out, true)
}

fn binary_int_bool(vm: &mut Vm, f: impl Fn(i64, i64) -> bool) -> Result<(), VmError> {
    vm.apply_cost(2)?;
    let b = vm.pop_int64(true)?;
    let a = vm.pop_int64(true)?;
    let out = f(a, b);
    vm.push_bool(out, true)
}

pub(super) fn op_1add(vm: &mut Vm) -> Result<(), VmError> {
    unary_int(vm, |n| n.checked_add(1).ok_or(VmError::Range))
}

pub(super) fn op_1sub(vm: &mut Vm) -> Result<(), VmError> {
    unary_int(vm, |n| n.checked_sub(1).ok_or(VmError::Range))
}

pub(super) fn op_2mul(vm: &mut Vm) -> Result<(), VmError> {
    unary_int(vm, |n| n.checked_mul(2).ok_or(VmError::Range))
}

pub(super) fn op_2div(vm: &mut Vm) -> Result<(), VmError> {
    unary_int(vm, |n| Ok(n >> 1))
}

pub(super) fn op_negate(vm: &mut Vm) -> Result<(), VmError> {
    unary_int(vm, |n| n.checked_neg().ok_or(VmError::Range))
}

pub(super) fn op_abs(vm: &mut Vm) -> Result<(), VmError> {
    unary_int(vm, |n| n.checked_abs().ok_or(VmError::Range))
}

pub(super) fn op_not(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(2)?;
    let n = vm.pop_int64(true)?;
    vm.push_bool(n == 0, true)
}

pub(super) fn op_0notequal(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(2)?;
    let n = vm.pop_int64(true)?;
    vm.push_bool(n != 0, true)
}

pub(super) fn op_add(vm: &mut Vm) -> Result<(), VmError> {
    binary_int(vm, |a, b| a.checked_add(b).ok_or(VmError::Range))
}

pub(super) fn op_sub(vm: &mut Vm) -> Result<(), VmError> {
    binary_int(vm, |a, b| a.checked_sub(b).ok_or(VmError::Range))
}

pub(super) fn op_mul(vm: &mut Vm) -> Result<(), VmError> {
    binary_int(vm, |a, b| a.checked_mul(b).ok_or(VmError::Range))
}

fn floored_divmod(a: i64, b: i64) -> Result<(i64, i64), VmError> {
    if b == 0 {
        return Err(VmError::DivZero);
    }
    let q = a.checked_div(b).ok_or(VmError::Range)?;
    let r = a - q * b;
    if r != 0 && (r < 0) != (b < 0) {
        Ok((q - 1, r + b))
    } else {
        Ok((q, r))
    }
}

pub(super) fn op_div(vm: &mut Vm) -> Result<(), VmError> {
    binary_int(vm, |a, b| floored_divmod(a, b).map(|(q, _)| q))
}

pub(super) fn op_mod(vm: &mut Vm) -> Result<(), VmError> {
    binary_int(vm, |a, b| floored_divmod(a, b).map(|(_, r)| r))
}

pub(super) fn op_lshift(vm: &mut Vm) -> Result<(), VmError> {
    binary_int(vm, |a, b| {
        if b < 0 {
            return Err(VmError::BadValue);
        }
        if a == 0 {
            return Ok(0);
        }
        if b >= 64 {
            return Err(VmError::Range);
        }
        let shifted = (a as i128) << b;
        i64::try_from(shifted).map_err(|_| VmError::Range)
    })
}

pub(super) fn op_rshift(vm: &mut Vm) -> Result<(), VmError> {
    binary_int(vm, |a, b| {
        if b < 0 {
            return Err(VmError::BadValue);
        }
        let shift = b.min(63);
        Ok(a >> shift)
    })
}

pub(super) fn op_booland(vm: &mut Vm) -> Result<(), VmError> {
    binary_int_bool(vm, |a, b| a != 0 && b != 0)
}

pub(super) fn op_boolor(vm: &mut Vm) -> Result<(), VmError> {
    binary_int_bool(vm, |a, b| a != 0 || b != 0)
}

pub(super) fn op_numequal(vm: &mut Vm) -> Result<(), VmError> {
    binary_int_bool(vm, |a, b| a == b)
}

pub(super) fn op_numnotequal(vm: &mut Vm) -> Result<(), VmError> {
    binary_int_bool(vm, |a, b| a != b)
}

pub(super) fn op_lessthan(vm: &mut Vm) -> Result<(), VmError> {
    binary_int_bool(vm, |a, b| a < b)
}

pub(super) fn op_greaterthan(vm: &mut Vm) -> Result<(), VmError> {
    binary_int_bool(vm, |a, b| a > b)
}

pub(super) fn op_lessthanorequal(vm: &mut Vm) -> Result<(), VmError> {
    binary_int_bool(vm, |a, b| a <= b)
}

pub(super) fn op_greaterthanorequal(vm: &mut Vm) -> Result<(), VmError> {
    binary_int_bool(vm, |a, b| a >= b)
}

pub(super) fn op_min(vm: &mut Vm) -> Result<(), VmError> {
    binary_int(vm, |a, b| Ok(a.min(b)))
}

pub(super) fn op_max(vm: &mut Vm) -> Result<(), VmError> {
    binary_int(vm, |a, b| Ok(a.max(b)))
}

pub(super) fn op_within(vm: &mut Vm) -> Result<(), VmError> {
    vm.apply_cost(2)?;
    let max = vm.pop_int64(true)?;
    let min = vm.pop_int64(true)?;
    let x = vm.pop_int64(true)?;
    vm.push_bool(min <= x && x < max, true)
}
