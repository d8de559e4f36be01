use std::collections::HashMap;

use crate::fault::CpuError;
use crate::state::Word;

/// Default number of addressable RAM cells.
pub const DEFAULT_RAM_SIZE: usize = 1024;

/// Sparse, bounds-checked word store. Unwritten cells read as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Ram {
    size: usize,
    cells: HashMap<u32, Word>,
}

impl Ram {
    /// Creates an empty RAM with `size` addressable cells.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: HashMap::new(),
        }
    }

    /// Number of addressable cells.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Validates `address` against `[0, size)` and returns the cell key.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::AccessViolation`] for negative or out-of-range
    /// addresses.
    pub fn check(&self, address: Word) -> Result<u32, CpuError> {
        usize::try_from(address)
            .ok()
            .filter(|index| *index < self.size)
            .and_then(|index| u32::try_from(index).ok())
            .ok_or(CpuError::AccessViolation { address })
    }

    /// Reads the cell at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::AccessViolation`] outside `[0, size)`.
    pub fn read(&self, address: Word) -> Result<Word, CpuError> {
        let key = self.check(address)?;
        Ok(self.cells.get(&key).copied().unwrap_or(0))
    }

    /// Writes the cell at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::AccessViolation`] outside `[0, size)`.
    pub fn write(&mut self, address: Word, value: Word) -> Result<(), CpuError> {
        let key = self.check(address)?;
        self.cells.insert(key, value);
        Ok(())
    }

    /// Forgets every written cell.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Written cells sorted by address.
    #[must_use]
    pub fn populated(&self) -> Vec<(u32, Word)> {
        let mut cells: Vec<_> = self.cells.iter().map(|(key, value)| (*key, *value)).collect();
        cells.sort_unstable_by_key(|(key, _)| *key);
        cells
    }
}
