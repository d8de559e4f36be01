use std::fmt;

use crate::fault::CpuError;
use crate::state::Word;

/// Upper bound on the register file size (4-bit register payload).
pub const MAX_REGISTER_COUNT: usize = 16;

/// Default register file size.
pub const DEFAULT_REGISTER_COUNT: usize = 16;

/// Fixed-size array of signed words addressed by id.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    values: Vec<Word>,
}

impl RegisterFile {
    /// Creates `count` zeroed registers.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            values: vec![0; count],
        }
    }

    /// Number of registers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true for a zero-sized file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reads register `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::InvalidRegister`] when `id` is outside the file.
    pub fn read(&self, id: u8) -> Result<Word, CpuError> {
        self.values
            .get(usize::from(id))
            .copied()
            .ok_or(CpuError::InvalidRegister(id))
    }

    /// Writes register `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::InvalidRegister`] when `id` is outside the file.
    pub fn write(&mut self, id: u8, value: Word) -> Result<(), CpuError> {
        let slot = self
            .values
            .get_mut(usize::from(id))
            .ok_or(CpuError::InvalidRegister(id))?;
        *slot = value;
        Ok(())
    }

    /// Zeroes every register.
    pub fn clear(&mut self) {
        self.values.fill(0);
    }

    /// All register values in id order.
    #[must_use]
    pub fn values(&self) -> &[Word] {
        &self.values
    }

    /// Canonical name of register `id`.
    #[must_use]
    pub fn name(id: u8) -> String {
        format!("r{id}")
    }

    /// Parses a register name of the exact form `[rR][0-9]+`.
    ///
    /// Returns the numeric id without range checking; callers compare it
    /// against the configured register count. Ids too large for `usize`
    /// saturate.
    #[must_use]
    pub fn parse_name(token: &str) -> Option<usize> {
        let digits = token.strip_prefix(['r', 'R'])?;
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        Some(digits.bytes().fold(0_usize, |acc, byte| {
            acc.saturating_mul(10)
                .saturating_add(usize::from(byte - b'0'))
        }))
    }
}

/// One condition flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Flag {
    /// Result was zero.
    Zero,
    /// Result was negative.
    Negative,
    /// Raw result left the signed range.
    Overflow,
    /// Raw result was negative or at least `2^bits`.
    Carry,
}

impl Flag {
    /// All flags in display order.
    pub const ALL: [Self; 4] = [Self::Zero, Self::Negative, Self::Overflow, Self::Carry];

    const fn bit(self) -> u8 {
        match self {
            Self::Zero => 1 << 0,
            Self::Negative => 1 << 1,
            Self::Overflow => 1 << 2,
            Self::Carry => 1 << 3,
        }
    }

    const fn letter(self) -> char {
        match self {
            Self::Zero => 'Z',
            Self::Negative => 'N',
            Self::Overflow => 'O',
            Self::Carry => 'C',
        }
    }
}

/// Condition flag register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Flags(u8);

impl Flags {
    /// Returns `true` when `flag` is set.
    #[must_use]
    pub const fn is_set(self, flag: Flag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Sets or clears `flag`.
    pub const fn set(&mut self, flag: Flag, enabled: bool) {
        if enabled {
            self.0 |= flag.bit();
        } else {
            self.0 &= !flag.bit();
        }
    }

    /// Clears every flag.
    pub const fn clear(&mut self) {
        self.0 = 0;
    }

    /// Raw bit pattern (`Z` in bit 0 through `C` in bit 3).
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, flag) in Flag::ALL.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}", flag.letter(), u8::from(self.is_set(*flag)))?;
        }
        Ok(())
    }
}
