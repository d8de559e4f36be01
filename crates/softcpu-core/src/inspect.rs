//! Between-step inspection: snapshots, observer hook and fault counters.

use crate::codec::Instruction;
use crate::fault::{CpuError, FaultClass};
use crate::state::{CpuState, Flags, Word};

/// Read-only view of the engine taken between two steps.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpuSnapshot {
    /// Program counter.
    pub pc: usize,
    /// Condition flags.
    pub flags: Flags,
    /// Register values in id order.
    pub registers: Vec<Word>,
    /// Most recently decoded instruction.
    pub last_instruction: Option<Instruction>,
    /// Instructions executed since construction or reset.
    pub instruction_count: u64,
    /// Execution has stopped.
    pub halted: bool,
    /// Execution is paused.
    pub paused: bool,
    /// Current stack depth.
    pub stack_depth: usize,
    /// Error that halted the engine.
    pub latched_fault: Option<CpuError>,
}

impl CpuSnapshot {
    /// Captures `state`.
    #[must_use]
    pub fn capture(state: &CpuState) -> Self {
        Self {
            pc: state.pc,
            flags: state.flags,
            registers: state.registers.values().to_vec(),
            last_instruction: state.last_instruction,
            instruction_count: state.instruction_count,
            halted: state.run_state.is_halted(),
            paused: state.run_state.is_paused(),
            stack_depth: state.stack.len(),
            latched_fault: state.run_state.latched_fault(),
        }
    }
}

/// Observer notified by the engine, for debuggers and tracing front ends.
pub trait Inspector {
    /// Called after every retired instruction.
    fn on_step(&mut self, snapshot: &CpuSnapshot);

    /// Called when an instruction at `pc` faults.
    fn on_fault(&mut self, pc: usize, error: &CpuError) {
        let _ = (pc, error);
    }
}

/// Per-class fault counters plus the last fault seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FaultCounters {
    /// Last fault raised, if any.
    pub last_fault: Option<CpuError>,
    /// Program counter of the last faulting instruction.
    pub last_fault_pc: usize,
    /// Saturating counter for codec faults.
    pub codec: u32,
    /// Saturating counter for memory faults.
    pub memory: u32,
    /// Saturating counter for stack faults.
    pub stack: u32,
    /// Saturating counter for dispatch faults.
    pub dispatch: u32,
    /// Saturating counter for arithmetic faults.
    pub arithmetic: u32,
}

impl FaultCounters {
    /// Records one fault at `pc`.
    pub fn record_fault(&mut self, error: CpuError, pc: usize) {
        self.last_fault = Some(error);
        self.last_fault_pc = pc;
        let counter = match error.class() {
            FaultClass::Codec => &mut self.codec,
            FaultClass::Memory => &mut self.memory,
            FaultClass::Stack => &mut self.stack,
            FaultClass::Dispatch => &mut self.dispatch,
            FaultClass::Arithmetic => &mut self.arithmetic,
        };
        *counter = counter.saturating_add(1);
    }

    /// Count for one class.
    #[must_use]
    pub const fn count(&self, class: FaultClass) -> u32 {
        match class {
            FaultClass::Codec => self.codec,
            FaultClass::Memory => self.memory,
            FaultClass::Stack => self.stack,
            FaultClass::Dispatch => self.dispatch,
            FaultClass::Arithmetic => self.arithmetic,
        }
    }

    /// Sum over every class.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.codec
            .saturating_add(self.memory)
            .saturating_add(self.stack)
            .saturating_add(self.dispatch)
            .saturating_add(self.arithmetic)
    }

    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Inspector for FaultCounters {
    fn on_step(&mut self, _snapshot: &CpuSnapshot) {}

    fn on_fault(&mut self, pc: usize, error: &CpuError) {
        self.record_fault(*error, pc);
    }
}
