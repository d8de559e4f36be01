//! Instruction execution pipeline.
//!
//! Execution happens in two phases:
//! 1. [`execute_instruction`] reads operands, validates every target and
//!    records the effects in an [`ExecuteState`] without touching the machine.
//! 2. [`commit_execution`] applies the recorded effects.
//!
//! A fault raised in phase 1 therefore leaves no partial side effects.

mod flags;
mod helpers;

pub use flags::FlagsUpdate;
pub use helpers::{cap, floor_div, floor_mod, shift_left, shift_right, signed_range, Capped};

use rand::rngs::StdRng;
use rand::Rng;

use crate::codec::{Instruction, Operand};
use crate::encoding::Opcode;
use crate::fault::CpuError;
use crate::state::{CpuState, Flag, Word};

/// Inclusive upper bound of values produced by `RND`.
pub const RND_MAX: Word = i32::MAX as Word;

/// Resolved destination of a pending write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    /// Register by validated id.
    Register(u8),
    /// RAM cell by validated address.
    Ram(u32),
}

/// Pending stack effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOp {
    /// Push a value.
    Push(Word),
    /// Drop the top value (already read during execute).
    Pop,
}

/// Pending display effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOp {
    /// `DSP x, y` with the latched colour.
    SetPixel {
        /// Column.
        x: Word,
        /// Row.
        y: Word,
        /// Colour latched by the last `COL`.
        color: Word,
    },
    /// `CLS`: wipes the visible image, leaving the back buffer.
    ClearImage,
    /// `BFR`.
    SwapBuffer,
    /// `SB v`.
    SetDrawingTarget(bool),
    /// `COL v`.
    SetColor(Word),
}

/// Side effects accumulated by one instruction, applied only on success.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecuteState {
    /// Register and RAM writes in operand order.
    pub writes: Vec<(WriteTarget, Word)>,
    /// Stack push or pop.
    pub stack_op: Option<StackOp>,
    /// Flag change.
    pub flags_update: FlagsUpdate,
    /// Program counter after the instruction.
    pub next_pc: usize,
    /// New colour latch value.
    pub color: Option<Word>,
    /// Display call to forward.
    pub display_op: Option<DisplayOp>,
    /// Value to print.
    pub print: Option<Word>,
    /// Instruction stops the machine.
    pub halt: bool,
}

impl ExecuteState {
    /// Empty effect set continuing at `next_pc`.
    #[must_use]
    pub fn new(next_pc: usize) -> Self {
        Self {
            next_pc,
            ..Self::default()
        }
    }
}

/// Per-run parameters the executor needs from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteParams {
    /// Word width used for capping.
    pub bits: u32,
    /// Whether `PRT` produces output.
    pub printing: bool,
}

/// Computes the effects of `instr` against `state`.
///
/// `state.pc` must already point past the instruction.
///
/// # Errors
///
/// Returns the first [`CpuError`] raised while reading operands or
/// validating targets. `state` is never modified.
#[allow(clippy::too_many_lines)]
pub fn execute_instruction(
    instr: &Instruction,
    state: &CpuState,
    params: ExecuteParams,
    rng: &mut StdRng,
) -> Result<ExecuteState, CpuError> {
    let mut exec = ExecuteState::new(state.pc);
    let ops = Operands { instr, state };
    let bits = params.bits;

    match instr.opcode() {
        Opcode::Nop => {}
        Opcode::Hlt => exec.halt = true,
        Opcode::Mov => {
            let dest = ops.target(0)?;
            let capped = cap(i128::from(ops.value(1)?), bits);
            exec.writes.push((dest, capped.value));
            exec.flags_update = FlagsUpdate::carry_overflow(capped);
        }
        Opcode::Add | Opcode::Adi => arith(&ops, &mut exec, bits, |a, b| Ok(a + b))?,
        Opcode::Sub | Opcode::Sbi => arith(&ops, &mut exec, bits, |a, b| Ok(a - b))?,
        Opcode::Mul => arith(&ops, &mut exec, bits, |a, b| Ok(a * b))?,
        Opcode::Div => arith(&ops, &mut exec, bits, |a, b| {
            floor_div(a, b).ok_or(CpuError::DivisionByZero)
        })?,
        Opcode::Mod => arith(&ops, &mut exec, bits, |a, b| {
            floor_mod(a, b).ok_or(CpuError::DivisionByZero)
        })?,
        #[allow(clippy::cast_possible_truncation)]
        Opcode::Shl => arith(&ops, &mut exec, bits, |a, b| {
            Ok(shift_left(a as Word, b as Word))
        })?,
        #[allow(clippy::cast_possible_truncation)]
        Opcode::Shr => arith(&ops, &mut exec, bits, |a, b| {
            Ok(shift_right(a as Word, b as Word))
        })?,
        Opcode::Inc => unary_arith(&ops, &mut exec, bits, |a| a + 1)?,
        Opcode::Dec => unary_arith(&ops, &mut exec, bits, |a| a - 1)?,
        Opcode::Neg => unary_arith(&ops, &mut exec, bits, |a| -a)?,
        Opcode::And => boolean(&ops, &mut exec, |a, b| a & b)?,
        Opcode::Or => boolean(&ops, &mut exec, |a, b| a | b)?,
        Opcode::Xor => boolean(&ops, &mut exec, |a, b| a ^ b)?,
        Opcode::Nand => boolean(&ops, &mut exec, |a, b| !(a & b))?,
        Opcode::Nor => boolean(&ops, &mut exec, |a, b| !(a | b))?,
        Opcode::Xnor => boolean(&ops, &mut exec, |a, b| !(a ^ b))?,
        Opcode::Not => {
            let dest = ops.target(0)?;
            let value = !ops.value(0)?;
            exec.writes.push((dest, value));
            exec.flags_update = FlagsUpdate::boolean(value);
        }
        Opcode::Test => {
            let value = ops.value(0)? & ops.value(1)?;
            exec.flags_update = FlagsUpdate::boolean(value);
        }
        Opcode::Cmp => {
            let raw = i128::from(ops.value(0)?) - i128::from(ops.value(1)?);
            exec.flags_update = FlagsUpdate::arithmetic(cap(raw, bits));
        }
        Opcode::Clr => {
            ops.operand(0)?;
            for operand in instr.operands() {
                let dest = ops.resolve_target(operand)?;
                exec.writes.push((dest, 0));
            }
        }
        Opcode::Jmp => jump(&ops, &mut exec, true)?,
        Opcode::Jz => jump(&ops, &mut exec, state.flags.is_set(Flag::Zero))?,
        Opcode::Jnz => jump(&ops, &mut exec, !state.flags.is_set(Flag::Zero))?,
        Opcode::Jn => jump(&ops, &mut exec, state.flags.is_set(Flag::Negative))?,
        Opcode::Jnn => jump(&ops, &mut exec, !state.flags.is_set(Flag::Negative))?,
        Opcode::Jo => jump(&ops, &mut exec, state.flags.is_set(Flag::Overflow))?,
        Opcode::Jno => jump(&ops, &mut exec, !state.flags.is_set(Flag::Overflow))?,
        Opcode::Jc => jump(&ops, &mut exec, state.flags.is_set(Flag::Carry))?,
        Opcode::Jnc => jump(&ops, &mut exec, !state.flags.is_set(Flag::Carry))?,
        Opcode::Call => {
            let target = jump_target(ops.value(0)?)?;
            state.stack.ensure_room()?;
            let return_pc = Word::try_from(state.pc).unwrap_or(Word::MAX);
            exec.stack_op = Some(StackOp::Push(return_pc));
            exec.next_pc = target;
        }
        Opcode::Ret => {
            let target = jump_target(state.stack.peek()?)?;
            exec.stack_op = Some(StackOp::Pop);
            exec.next_pc = target;
        }
        Opcode::Push => {
            let value = ops.value(0)?;
            state.stack.ensure_room()?;
            exec.stack_op = Some(StackOp::Push(value));
        }
        Opcode::Pop => {
            let dest = ops.target(0)?;
            let value = state.stack.peek()?;
            exec.stack_op = Some(StackOp::Pop);
            exec.writes.push((dest, value));
        }
        Opcode::Ldr => {
            let dest = ops.target(0)?;
            let value = ops.value(1)?;
            exec.writes.push((dest, value));
        }
        Opcode::Str => {
            let address = ops.store_address(0)?;
            let value = ops.value(1)?;
            exec.writes.push((WriteTarget::Ram(address), value));
        }
        Opcode::Dsp => {
            exec.display_op = Some(DisplayOp::SetPixel {
                x: ops.value(0)?,
                y: ops.value(1)?,
                color: state.color,
            });
        }
        Opcode::Cls => exec.display_op = Some(DisplayOp::ClearImage),
        Opcode::Bfr => exec.display_op = Some(DisplayOp::SwapBuffer),
        Opcode::Sb => {
            exec.display_op = Some(DisplayOp::SetDrawingTarget(ops.value(0)? != 0));
        }
        Opcode::Col => {
            let color = ops.value(0)?;
            exec.color = Some(color);
            exec.display_op = Some(DisplayOp::SetColor(color));
        }
        Opcode::Prt => {
            let value = ops.value(0)?;
            if params.printing {
                exec.print = Some(value);
            }
        }
        Opcode::Rnd => {
            let dest = ops.target(0)?;
            exec.writes.push((dest, rng.gen_range(0..=RND_MAX)));
        }
    }

    Ok(exec)
}

/// Applies the effects produced by [`execute_instruction`] to `state`.
///
/// Display and console effects are left to the caller.
///
/// # Errors
///
/// Every target was validated during execute; an error here means `state`
/// changed between the two phases.
pub fn commit_execution(state: &mut CpuState, exec: &ExecuteState) -> Result<(), CpuError> {
    match exec.stack_op {
        Some(StackOp::Push(value)) => state.stack.push(value)?,
        Some(StackOp::Pop) => {
            state.stack.pop()?;
        }
        None => {}
    }
    for (target, value) in &exec.writes {
        match *target {
            WriteTarget::Register(id) => state.registers.write(id, *value)?,
            WriteTarget::Ram(address) => state.ram.write(Word::from(address), *value)?,
        }
    }
    exec.flags_update.apply(&mut state.flags);
    if let Some(color) = exec.color {
        state.color = color;
    }
    if exec.halt {
        state.run_state.halt();
    }
    state.pc = exec.next_pc;
    Ok(())
}

struct Operands<'a> {
    instr: &'a Instruction,
    state: &'a CpuState,
}

impl Operands<'_> {
    fn operand(&self, index: usize) -> Result<Operand, CpuError> {
        self.instr
            .operand(index)
            .ok_or(CpuError::MissingOperand {
                opcode: self.instr.opcode(),
                index,
            })
    }

    fn value(&self, index: usize) -> Result<Word, CpuError> {
        let registers = &self.state.registers;
        let ram = &self.state.ram;
        match self.operand(index)? {
            Operand::Register(id) => registers.read(id),
            Operand::Immediate(value) => Ok(Word::from(value)),
            Operand::MemoryAddress(addr) => ram.read(Word::from(addr)),
            Operand::RegisterMemory(id) => ram.read(registers.read(id)?),
        }
    }

    fn target(&self, index: usize) -> Result<WriteTarget, CpuError> {
        self.resolve_target(self.operand(index)?)
    }

    fn resolve_target(&self, operand: Operand) -> Result<WriteTarget, CpuError> {
        let registers = &self.state.registers;
        let ram = &self.state.ram;
        match operand {
            Operand::Register(id) => registers.read(id).map(|_| WriteTarget::Register(id)),
            Operand::Immediate(_) => Err(CpuError::InvalidWriteTarget),
            Operand::MemoryAddress(addr) => ram.check(Word::from(addr)).map(WriteTarget::Ram),
            Operand::RegisterMemory(id) => ram.check(registers.read(id)?).map(WriteTarget::Ram),
        }
    }

    /// `STR` destination. `[N]` and `[rN]` name a cell as usual; a bare
    /// register or immediate is taken as the address itself.
    fn store_address(&self, index: usize) -> Result<u32, CpuError> {
        let address = match self.operand(index)? {
            Operand::MemoryAddress(addr) => Word::from(addr),
            Operand::Register(id) | Operand::RegisterMemory(id) => self.state.registers.read(id)?,
            Operand::Immediate(value) => Word::from(value),
        };
        self.state.ram.check(address)
    }
}

fn arith(
    ops: &Operands<'_>,
    exec: &mut ExecuteState,
    bits: u32,
    op: impl FnOnce(i128, i128) -> Result<i128, CpuError>,
) -> Result<(), CpuError> {
    let dest = ops.target(0)?;
    let raw = op(i128::from(ops.value(0)?), i128::from(ops.value(1)?))?;
    let capped = cap(raw, bits);
    exec.writes.push((dest, capped.value));
    exec.flags_update = FlagsUpdate::arithmetic(capped);
    Ok(())
}

fn unary_arith(
    ops: &Operands<'_>,
    exec: &mut ExecuteState,
    bits: u32,
    op: impl FnOnce(i128) -> i128,
) -> Result<(), CpuError> {
    let dest = ops.target(0)?;
    let capped = cap(op(i128::from(ops.value(0)?)), bits);
    exec.writes.push((dest, capped.value));
    exec.flags_update = FlagsUpdate::arithmetic(capped);
    Ok(())
}

fn boolean(
    ops: &Operands<'_>,
    exec: &mut ExecuteState,
    op: impl FnOnce(Word, Word) -> Word,
) -> Result<(), CpuError> {
    let dest = ops.target(0)?;
    let value = op(ops.value(0)?, ops.value(1)?);
    exec.writes.push((dest, value));
    exec.flags_update = FlagsUpdate::boolean(value);
    Ok(())
}

fn jump(ops: &Operands<'_>, exec: &mut ExecuteState, taken: bool) -> Result<(), CpuError> {
    ops.operand(0)?;
    if taken {
        exec.next_pc = jump_target(ops.value(0)?)?;
    }
    Ok(())
}

fn jump_target(value: Word) -> Result<usize, CpuError> {
    usize::try_from(value).map_err(|_| CpuError::AccessViolation { address: value })
}
