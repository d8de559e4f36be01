//! Instruction codec and execution engine for the softcpu ISA.

/// Opcode identities and the mnemonic table.
pub mod encoding;
pub use encoding::{Opcode, OPCODE_ID_BITS, OPCODE_ID_MASK, OPCODE_TABLE};

/// Binary instruction format: operands, encode, decode.
pub mod codec;
pub use codec::{
    decode, encode, fetch_length, instruction_length, Instruction, Operand, OperandKind,
    HEADER_BYTES, MAX_ENCODABLE_REGISTER, MAX_OPERANDS,
};

/// Error taxonomy shared by the codec and the engine.
pub mod fault;
pub use fault::{CpuError, DecodingError, EncodingError, FaultClass};

/// Architectural CPU state model primitives.
pub mod state;
pub use state::{
    CpuState, Flag, Flags, RegisterFile, RunState, Word, DEFAULT_REGISTER_COUNT,
    MAX_REGISTER_COUNT,
};

/// RAM, stack and ROM.
pub mod memory;
pub use memory::{Ram, Rom, Stack, DEFAULT_RAM_SIZE, DEFAULT_STACK_SIZE};

/// Instruction execution pipeline.
pub mod execute;
pub use execute::{
    cap, commit_execution, execute_instruction, Capped, DisplayOp, ExecuteParams, ExecuteState,
    FlagsUpdate, RND_MAX,
};

/// LRU cache of decoded instructions.
pub mod cache;
pub use cache::{DecodeCache, DEFAULT_DECODE_CACHE_CAPACITY};

/// Public host-facing API contract and integration types.
pub mod api;
pub use api::{
    ConfigError, Cpu, CpuConfig, RunBoundary, RunOutcome, StepOutcome, BITS_RANGE, DEFAULT_BITS,
};

/// Snapshots, the inspector hook and fault counters.
pub mod inspect;
pub use inspect::{CpuSnapshot, FaultCounters, Inspector};

/// Optional wall-clock step timing.
pub mod timing;
pub use timing::{StepTimings, TIMING_WINDOW};

/// ROM disassembly for listings and debuggers.
pub mod disasm;
pub use disasm::{disassemble, disassemble_window, DisassemblyRow};

/// Display and console capabilities.
pub mod peripherals;
pub use peripherals::{BufferConsole, Console, Display, FrameBuffer, StdoutConsole};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
