use thiserror::Error;

use crate::encoding::Opcode;

/// Fault classes used for diagnostics aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Codec rejected an instruction shape.
    Codec,
    /// RAM or ROM address outside configured bounds.
    Memory,
    /// Stack capacity or emptiness violated.
    Stack,
    /// Unknown opcode/register, bad write target, or missing operand.
    Dispatch,
    /// Arithmetic fault such as division by zero.
    Arithmetic,
}

/// Reasons an instruction cannot be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EncodingError {
    /// The 2-bit count field holds at most two operands.
    #[error("cannot encode {count} operands (at most 2)")]
    TooManyOperands {
        /// Number of operands supplied.
        count: usize,
    },
    /// Register payloads are 4 bits wide.
    #[error("register id {0} does not fit the 4-bit operand payload")]
    RegisterOutOfRange(u8),
}

/// Reasons a byte sequence cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DecodingError {
    /// No bytes were supplied.
    #[error("empty instruction")]
    Empty,
    /// Operand count field value 3 has no meaning.
    #[error("operand count {0} is not encodable")]
    InvalidOperandCount(u8),
    /// The byte stream ended before the instruction did.
    #[error("instruction truncated: needed {needed} bytes, had {available}")]
    Truncated {
        /// Bytes required by the header.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },
    /// Bytes were left over after the last operand.
    #[error("{0} trailing bytes after instruction")]
    TrailingBytes(usize),
}

/// Errors raised by the codec and the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CpuError {
    /// Malformed instruction shape on encode.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
    /// Malformed instruction bytes on decode or fetch.
    #[error("decoding error: {0}")]
    Decoding(#[from] DecodingError),
    /// RAM, ROM or jump target outside configured bounds.
    #[error("access violation at address {address}")]
    AccessViolation {
        /// Offending address.
        address: i64,
    },
    /// Push onto a full stack.
    #[error("stack overflow (capacity {capacity})")]
    StackOverflow {
        /// Configured stack depth.
        capacity: usize,
    },
    /// Pop from an empty stack.
    #[error("stack underflow")]
    StackUnderflow,
    /// Opcode id not present in the opcode table.
    #[error("invalid opcode {0}")]
    InvalidOpcode(u8),
    /// Register id outside the configured register file.
    #[error("invalid register r{0}")]
    InvalidRegister(u8),
    /// Immediate operands cannot be written.
    #[error("immediate operand used as write target")]
    InvalidWriteTarget,
    /// `DIV`/`MOD` with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,
    /// Instruction carries fewer operands than its opcode reads.
    #[error("{opcode} is missing operand {index}")]
    MissingOperand {
        /// Opcode being executed.
        opcode: Opcode,
        /// Zero-based operand slot.
        index: usize,
    },
}

impl CpuError {
    /// Returns the diagnostics fault class for this error.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::Encoding(_) | Self::Decoding(_) => FaultClass::Codec,
            Self::AccessViolation { .. } => FaultClass::Memory,
            Self::StackOverflow { .. } | Self::StackUnderflow => FaultClass::Stack,
            Self::InvalidOpcode(_)
            | Self::InvalidRegister(_)
            | Self::InvalidWriteTarget
            | Self::MissingOperand { .. } => FaultClass::Dispatch,
            Self::DivisionByZero => FaultClass::Arithmetic,
        }
    }
}
