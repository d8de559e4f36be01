//! Architectural CPU state model primitives.

/// Register file and condition flags.
pub mod registers;
/// Halt/pause/fault run control.
pub mod run_state;

pub use registers::{Flag, Flags, RegisterFile, DEFAULT_REGISTER_COUNT, MAX_REGISTER_COUNT};
pub use run_state::RunState;

use crate::codec::Instruction;
use crate::memory::{Ram, Stack};

/// Machine word. Capped values always fit the configured bit width.
pub type Word = i64;

/// Mutable architectural state: everything `reset` zeroes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpuState {
    /// Byte offset of the next instruction in ROM.
    pub pc: usize,
    /// General-purpose registers.
    pub registers: RegisterFile,
    /// Data memory.
    pub ram: Ram,
    /// Call/data stack.
    pub stack: Stack,
    /// Condition flags.
    pub flags: Flags,
    /// Halt, pause and latched fault.
    pub run_state: RunState,
    /// Instructions executed since construction or reset.
    pub instruction_count: u64,
    /// Most recently decoded instruction.
    pub last_instruction: Option<Instruction>,
    /// Colour set by the last `COL`.
    pub color: Word,
}

impl CpuState {
    /// Zeroed state sized by the given resources.
    #[must_use]
    pub fn new(register_count: usize, ram_size: usize, stack_size: usize) -> Self {
        Self {
            pc: 0,
            registers: RegisterFile::new(register_count),
            ram: Ram::new(ram_size),
            stack: Stack::new(stack_size),
            flags: Flags::default(),
            run_state: RunState::default(),
            instruction_count: 0,
            last_instruction: None,
            color: 0,
        }
    }

    /// Zeroes every resource, clears halt and leaves the state paused.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.registers.clear();
        self.ram.clear();
        self.stack.clear();
        self.flags.clear();
        self.run_state.reset();
        self.instruction_count = 0;
        self.last_instruction = None;
        self.color = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{CpuState, Flag};
    use crate::fault::CpuError;

    #[test]
    fn reset_restores_zeroed_paused_state() {
        let mut state = CpuState::new(4, 8, 8);
        state.pc = 12;
        state.registers.write(1, 5).expect("in range");
        state.ram.write(3, 9).expect("in range");
        state.stack.push(1).expect("room");
        state.flags.set(Flag::Carry, true);
        state.instruction_count = 3;
        state.color = 0xFF;
        state.run_state.latch_fault(CpuError::StackUnderflow);

        state.reset();

        let mut expected = CpuState::new(4, 8, 8);
        expected.run_state.set_paused(true);
        assert_eq!(state, expected);
    }
}
