//! Stack-based bytecode virtual machine.
//!
//! The machine owns a data stack, an alt stack, and a control-flow
//! stack, and is metered by a `run_limit` budget: every opcode debits a
//! fixed cost, every pushed stack byte costs extra, and popped bytes are
//! refunded. Deferred costs accumulate during an instruction and flush
//! at the instruction boundary. The VM has no clock, no randomness, and
//! no I/O; its entire behavior is a function of the program, the initial
//! stacks, and the bound transaction or block context.

pub mod assemble;
mod crypto;
mod introspection;
pub mod ops;
pub mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::entry::{BlockHeader, Entry};
use crate::error::VmError;
use crate::transaction::Transaction;
use crate::types::Hash;

use ops::{parse_op, Instruction};
use types::as_bool;

/// Run-limit budget given to each top-level program.
pub const INITIAL_RUN_LIMIT: i64 = 50_000;

/// Best-effort cancellation shared across concurrent validation work.
/// The VM observes it at control-flow boundaries and CHECKPREDICATE
/// entry.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What the introspection opcodes can see.
#[derive(Clone, Copy)]
pub(crate) enum Context<'a> {
    None,
    Tx {
        tx: &'a Transaction,
        input_id: Hash,
    },
    Block {
        header: &'a BlockHeader,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlOp {
    If,
    While,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ControlTuple {
    pub op: ControlOp,
    pub flag: bool,
    pub pc: usize,
}

type Stack = SmallVec<[Vec<u8>; 8]>;

/// One executing virtual machine. CHECKPREDICATE spawns children that
/// own their stacks and a carved-out slice of the parent's run limit.
pub struct Vm<'a> {
    pub(crate) program: Vec<u8>,
    pub(crate) pc: usize,
    pub(crate) next_pc: usize,
    pub(crate) run_limit: i64,
    pub(crate) deferred_cost: i64,
    pub(crate) data: Vec<u8>,
    pub(crate) depth: u32,
    pub(crate) data_stack: Stack,
    pub(crate) alt_stack: Stack,
    pub(crate) control_stack: Vec<ControlTuple>,
    pub(crate) context: Context<'a>,
    pub(crate) mainprog: Vec<u8>,
    pub(crate) cancel: Option<&'a CancelToken>,
}

impl<'a> Vm<'a> {
    pub fn new(program: Vec<u8>, run_limit: i64) -> Vm<'a> {
        let mainprog = program.clone();
        Vm {
            program,
            pc: 0,
            next_pc: 0,
            run_limit,
            deferred_cost: 0,
            data: Vec::new(),
            depth: 0,
            data_stack: SmallVec::new(),
            alt_stack: SmallVec::new(),
            control_stack: Vec::new(),
            context: Context::None,
            mainprog,
            cancel: None,
        }
    }

    pub fn bind_tx(mut self, tx: &'a Transaction, input_id: Hash) -> Vm<'a> {
        self.context = Context::Tx { tx, input_id };
        self
    }

    pub fn bind_block(mut self, header: &'a BlockHeader) -> Vm<'a> {
        self.context = Context::Block { header };
        self
    }

    pub fn bind_cancel(mut self, token: &'a CancelToken) -> Vm<'a> {
        self.cancel = Some(token);
        self
    }

    /// Load the input witness arguments as the initial data stack,
    /// charging stack cost for each item.
    pub fn init_args(&mut self, args: &[Vec<u8>]) -> Result<(), VmError> {
        for arg in args {
            self.push(arg.clone(), false)?;
        }
        Ok(())
    }

    /// Budget still available; with determinism, a function of the
    /// program, stacks, and context alone.
    pub fn remaining_run_limit(&self) -> i64 {
        self.run_limit
    }

    /// Execute to completion. The result is the truthiness of the top of
    /// the data stack (false when empty).
    pub fn run(&mut self) -> Result<bool, VmError> {
        self.pc = 0;
        while self.pc < self.program.len() {
            self.step()?;
        }
        if !self.control_stack.is_empty() {
            return Err(VmError::NonEmptyControlStack);
        }
        Ok(self.data_stack.last().map(|top| as_bool(top)).unwrap_or(false))
    }

    fn step(&mut self) -> Result<(), VmError> {
        let Instruction { op, len, data_start, data_len } = parse_op(&self.program, self.pc)?;
        self.next_pc = self.pc + len;
        let is_control = ops::is_control_op(op);

        if is_control {
            if let Some(token) = self.cancel {
                if token.is_cancelled() {
                    return Err(VmError::Cancelled);
                }
            }
        }

        if is_control || self.should_exec() {
            self.deferred_cost = 0;
            self.data.clear();
            self.data
                .extend_from_slice(&self.program[data_start..data_start + data_len]);
            self.execute(op)?;
            let deferred = self.deferred_cost;
            self.apply_cost(deferred)?;
        } else {
            self.apply_cost(1)?;
        }

        self.pc = self.next_pc;
        Ok(())
    }

    fn execute(&mut self, op: u8) -> Result<(), VmError> {
        use ops::*;
        match op {
            // Pushes. OP_0 through OP_PUSHDATA4 carry their payload in
            // the parsed instruction data.
            OP_0..=OP_PUSHDATA4 => op_pushdata(self),
            OP_1NEGATE => op_1negate(self),
            OP_1..=OP_16 => op_push_small(self, (op - OP_N_BASE) as i64),

            // Control flow.
            OP_WHILE => op_while(self),
            OP_ENDWHILE => op_endwhile(self),
            OP_IF => op_if(self, false),
            OP_NOTIF => op_if(self, true),
            OP_ELSE => op_else(self),
            OP_ENDIF => op_endif(self),
            OP_VERIFY => op_verify(self),
            OP_FAIL => op_fail(self),

            // Stack.
            OP_TOALTSTACK => op_toaltstack(self),
            OP_FROMALTSTACK => op_fromaltstack(self),
            OP_DEPTH => op_depth(self),
            OP_DROP => op_drop(self),
            OP_DUP => op_dup(self),
            OP_OVER => op_over(self),
            OP_PICK => op_pick(self),
            OP_ROLL => op_roll(self),
            OP_SWAP => op_swap(self),

            // Bitwise and byte-string comparison.
            OP_INVERT => op_invert(self),
            OP_AND => op_and(self),
            OP_OR => op_or(self),
            OP_XOR => op_xor(self),
            OP_EQUAL => op_equal(self),

            // Numeric.
            OP_1ADD => op_1add(self),
            OP_1SUB => op_1sub(self),
            OP_2MUL => op_2mul(self),
            OP_2DIV => op_2div(self),
            OP_NEGATE => op_negate(self),
            OP_ABS => op_abs(self),
            OP_NOT => op_not(self),
            OP_0NOTEQUAL => op_0notequal(self),
            OP_ADD => op_add(self),
            OP_SUB => op_sub(self),
            OP_MUL => op_mul(self),
            OP_DIV => op_div(self),
            OP_MOD => op_mod(self),
            OP_LSHIFT => op_lshift(self),
            OP_RSHIFT => op_rshift(self),
            OP_BOOLAND => op_booland(self),
            OP_BOOLOR => op_boolor(self),
            OP_NUMEQUAL => op_numequal(self),
            OP_NUMNOTEQUAL => op_numnotequal(self),
            OP_LESSTHAN => op_lessthan(self),
            OP_GREATERTHAN => op_greaterthan(self),
            OP_LESSTHANOREQUAL => op_lessthanorequal(self),
            OP_GREATERTHANOREQUAL => op_greaterthanorequal(self),
            OP_MIN => op_min(self),
            OP_MAX => op_max(self),
            OP_WITHIN => op_within(self),

            // Crypto.
            OP_SHA3 => crypto::op_sha3(self),
            OP_CHECKSIG => crypto::op_checksig(self),
            OP_CHECKMULTISIG => crypto::op_checkmultisig(self),
            OP_TXSIGHASH => crypto::op_txsighash(self),
            OP_CHECKPREDICATE => crypto::op_checkpredicate(self),

            // Introspection.
            OP_CHECKOUTPUT => introspection::op_checkoutput(self),
            OP_ASSET => introspection::op_asset(self),
            OP_AMOUNT => introspection::op_amount(self),
            OP_PROGRAM => introspection::op_program(self),
            OP_MINTIME => introspection::op_mintime(self),
            OP_MAXTIME => introspection::op_maxtime(self),
            OP_REFDATAHASH => introspection::op_refdatahash(self),
            OP_TXREFDATAHASH => introspection::op_txrefdatahash(self),
            OP_OUTPUTID => introspection::op_outputid(self),
            OP_NONCE => introspection::op_nonce(self),
            OP_NEXTPROGRAM => introspection::op_nextprogram(self),
            OP_BLOCKTIME => introspection::op_blocktime(self),

            other => Err(VmError::UnknownOpcode(other)),
        }
    }

    /// True when no enclosing IF/NOTIF/WHILE branch is skipping.
    pub(crate) fn should_exec(&self) -> bool {
        self.control_stack.iter().all(|t| t.flag)
    }

    pub(crate) fn apply_cost(&mut self, cost: i64) -> Result<(), VmError> {
        if cost > self.run_limit {
            self.run_limit = 0;
            return Err(VmError::RunLimitExceeded);
        }
        self.run_limit -= cost;
        Ok(())
    }

    pub(crate) fn defer_cost(&mut self, cost: i64) {
        self.deferred_cost += cost;
    }

    pub(crate) fn stack_cost(item: &[u8]) -> i64 {
        8 + item.len() as i64
    }

    pub(crate) fn push(&mut self, data: Vec<u8>, deferred: bool) -> Result<(), VmError> {
        let cost = Vm::stack_cost(&data);
        if deferred {
            self.defer_cost(cost);
        } else {
            self.apply_cost(cost)?;
        }
        self.data_stack.push(data);
        Ok(())
    }

    pub(crate) fn push_bool(&mut self, b: bool, deferred: bool) -> Result<(), VmError> {
        self.push(types::bool_bytes(b), deferred)
    }

    pub(crate) fn push_int64(&mut self, n: i64, deferred: bool) -> Result<(), VmError> {
        self.push(types::int64_bytes(n), deferred)
    }

    pub(crate) fn pop(&mut self, deferred: bool) -> Result<Vec<u8>, VmError> {
        let item = self.data_stack.pop().ok_or(VmError::DataStackUnderflow)?;
        let refund = -Vm::stack_cost(&item);
        if deferred {
            self.defer_cost(refund);
        } else {
            self.apply_cost(refund)?;
        }
        Ok(item)
    }

    pub(crate) fn pop_int64(&mut self, deferred: bool) -> Result<i64, VmError> {
        let item = self.pop(deferred)?;
        types::as_int64(&item)
    }

    pub(crate) fn top(&self) -> Result<&[u8], VmError> {
        self.data_stack
            .last()
            .map(|v| v.as_slice())
            .ok_or(VmError::DataStackUnderflow)
    }

    pub(crate) fn tx_context(&self) -> Result<(&'a Transaction, Hash), VmError> {
        match self.context {
            Context::Tx { tx, input_id } => Ok((tx, input_id)),
            _ => Err(VmError::Context),
        }
    }

    pub(crate) fn block_context(&self) -> Result<&'a BlockHeader, VmError> {
        match self.context {
            Context::Block { header } => Ok(header),
            _ => Err(VmError::Context),
        }
    }
}

/// Run an input's authorization program: the control program of the
/// spent output for a spend, the issuance program for an issuance. The
/// input's witness arguments form the initial data stack. Failure of
/// any kind (including a false result) rejects the input.
pub fn verify_tx_input(
    tx: &Transaction,
    input_id: &Hash,
    cancel: Option<&CancelToken>,
) -> Result<(), VmError> {
    let entry = tx
        .entry(input_id)
        .ok_or(VmError::MissingEntry(*input_id))?;
    let (program, args) = match entry {
        Entry::Spend(sp) => {
            let program = tx
                .spend_control_program(sp)
                .ok_or(VmError::MissingEntry(sp.body.spent_output))?;
            (program.clone(), sp.witness.arguments.clone())
        }
        Entry::Issuance(iss) => (
            iss.witness.issuance_program.clone(),
            iss.witness.arguments.clone(),
        ),
        _ => return Err(VmError::Context),
    };
    if program.vm_version != 1 {
        return Err(VmError::UnsupportedVm(program.vm_version));
    }
    let mut vm = Vm::new(program.code, INITIAL_RUN_LIMIT).bind_tx(tx, *input_id);
    if let Some(token) = cancel {
        vm = vm.bind_cancel(token);
    }
    vm.init_args(&args)?;
    if vm.run()? {
        Ok(())
    } else {
        Err(VmError::FalseResult)
    }
}

/// Run the previous block's consensus program against a newly proposed
/// block: the new block's header witness arguments form the initial
/// data stack, and the block context is bound for NEXTPROGRAM/BLOCKTIME.
pub fn verify_block_header(prev: &BlockHeader, block: &BlockHeader) -> Result<(), VmError> {
    let program = prev.body.next_consensus_program.clone();
    let mut vm = Vm::new(program, INITIAL_RUN_LIMIT).bind_block(block);
    vm.init_args(&block.witness.arguments)?;
    if vm.run()? {
        Ok(())
    } else {
        Err(VmError::FalseResult)
    }
}

/// Evaluate a bare program with the given initial arguments and no
/// transaction or block context.
pub fn eval(program: &[u8], args: &[Vec<u8>], run_limit: i64) -> Result<bool, VmError> {
    let mut vm = Vm::new(program.to_vec(), run_limit);
    vm.init_args(args)?;
    vm.run()
}

/// Evaluate a program with a transaction context bound, as if it were
/// the authorization program of `input_id`.
pub fn eval_with_tx(
    tx: &Transaction,
    input_id: &Hash,
    program: &[u8],
    args: &[Vec<u8>],
    run_limit: i64,
) -> Result<bool, VmError> {
    let mut vm = Vm::new(program.to_vec(), run_limit).bind_tx(tx, *input_id);
    vm.init_args(args)?;
    vm.run()
}

#[cfg(test)]
mod tests {
    use super::ops::*;
    use super::*;

    #[test]
    fn true_program_runs_true() {
        assert_eq!(eval(&[OP_TRUE], &[], INITIAL_RUN_LIMIT), Ok(true));
    }

    #[test]
    fn empty_stack_is_false() {
        assert_eq!(eval(&[], &[], INITIAL_RUN_LIMIT), Ok(false));
    }

    #[test]
    fn underflow_reported() {
        assert_eq!(
            eval(&[OP_ADD], &[], INITIAL_RUN_LIMIT),
            Err(VmError::DataStackUnderflow)
        );
    }

    #[test]
    fn dangling_if_reported() {
        assert_eq!(
            eval(&[OP_TRUE, OP_IF], &[], INITIAL_RUN_LIMIT),
            Err(VmError::NonEmptyControlStack)
        );
    }

    #[test]
    fn unknown_opcode_reported() {
        assert_eq!(
            eval(&[0xff], &[], INITIAL_RUN_LIMIT),
            Err(VmError::UnknownOpcode(0xff))
        );
    }

    #[test]
    fn push_costs_meter_the_run_limit() {
        // OP_TRUE: 1 for the opcode plus 8+1 for the pushed byte.
        let mut vm = Vm::new(vec![OP_TRUE], 50_000);
        assert_eq!(vm.run(), Ok(true));
        assert_eq!(vm.remaining_run_limit(), 50_000 - 10);
    }

    #[test]
    fn skipped_instructions_cost_one() {
        // FALSE IF TRUE ENDIF: the TRUE inside the dead branch costs 1.
        let mut a = Vm::new(vec![OP_FALSE, OP_IF, OP_TRUE, OP_ENDIF], 50_000);
        assert_eq!(a.run(), Ok(false));
        // FALSE IF ENDIF: identical but without the dead instruction.
        let mut b = Vm::new(vec![OP_FALSE, OP_IF, OP_ENDIF], 50_000);
        assert_eq!(b.run(), Ok(false));
        assert_eq!(a.remaining_run_limit() + 1, b.remaining_run_limit());
    }

    #[test]
    fn oversized_initial_args_exceed_limit() {
        let big = vec![0u8; INITIAL_RUN_LIMIT as usize + 1];
        let mut vm = Vm::new(vec![OP_TRUE], INITIAL_RUN_LIMIT);
        assert_eq!(vm.init_args(&[big]), Err(VmError::RunLimitExceeded));
    }

    #[test]
    fn determinism_same_limit_same_result() {
        let prog = vec![OP_1, OP_2, OP_ADD, OP_3, OP_NUMEQUAL];
        let mut a = Vm::new(prog.clone(), 1_000);
        let mut b = Vm::new(prog, 1_000);
        assert_eq!(a.run(), b.run());
        assert_eq!(a.remaining_run_limit(), b.remaining_run_limit());
    }

    #[test]
    fn cancellation_observed_at_control_flow() {
        let token = CancelToken::new();
        token.cancel();
        let prog = vec![OP_TRUE, OP_WHILE, OP_FALSE, OP_ENDWHILE];
        let mut vm = Vm::new(prog, 50_000).bind_cancel(&token);
        assert_eq!(vm.run(), Err(VmError::Cancelled));
    }
}
