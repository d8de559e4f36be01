//! Flag update behaviors for different instruction classes.

use super::helpers::Capped;
use crate::state::{Flag, Flags, Word};

/// Describes how flags change after an instruction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagsUpdate {
    /// No change.
    #[default]
    None,
    /// Only carry and overflow from a capped write (`MOV`).
    CarryOverflow {
        /// Carry flag.
        carry: bool,
        /// Overflow flag.
        overflow: bool,
    },
    /// Full arithmetic update.
    Arithmetic {
        /// Zero flag.
        zero: bool,
        /// Negative flag.
        negative: bool,
        /// Carry flag.
        carry: bool,
        /// Overflow flag.
        overflow: bool,
    },
    /// Boolean result: zero from the value, everything else cleared.
    Boolean {
        /// Zero flag.
        zero: bool,
    },
}

impl FlagsUpdate {
    /// Arithmetic update from a capped result.
    #[must_use]
    pub const fn arithmetic(capped: Capped) -> Self {
        Self::Arithmetic {
            zero: capped.value == 0,
            negative: capped.value < 0,
            carry: capped.carry,
            overflow: capped.overflow,
        }
    }

    /// Carry/overflow-only update from a capped result.
    #[must_use]
    pub const fn carry_overflow(capped: Capped) -> Self {
        Self::CarryOverflow {
            carry: capped.carry,
            overflow: capped.overflow,
        }
    }

    /// Boolean update from an uncapped bitwise result.
    #[must_use]
    pub const fn boolean(value: Word) -> Self {
        Self::Boolean { zero: value == 0 }
    }

    /// Applies the update to `flags`.
    pub const fn apply(self, flags: &mut Flags) {
        match self {
            Self::None => {}
            Self::CarryOverflow { carry, overflow } => {
                flags.set(Flag::Carry, carry);
                flags.set(Flag::Overflow, overflow);
            }
            Self::Arithmetic {
                zero,
                negative,
                carry,
                overflow,
            } => {
                flags.set(Flag::Zero, zero);
                flags.set(Flag::Negative, negative);
                flags.set(Flag::Carry, carry);
                flags.set(Flag::Overflow, overflow);
            }
            Self::Boolean { zero } => {
                flags.set(Flag::Zero, zero);
                flags.set(Flag::Negative, false);
                flags.set(Flag::Carry, false);
                flags.set(Flag::Overflow, false);
            }
        }
    }
}
