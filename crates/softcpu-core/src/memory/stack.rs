use crate::fault::CpuError;
use crate::state::Word;

/// Default stack depth.
pub const DEFAULT_STACK_SIZE: usize = 1024;

/// Bounded LIFO of words shared by `PUSH`/`POP` and `CALL`/`RET`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Stack {
    capacity: usize,
    items: Vec<Word>,
}

impl Stack {
    /// Creates an empty stack holding at most `capacity` words.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::new(),
        }
    }

    /// Maximum depth.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when nothing is stacked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Checks that one more push would fit.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::StackOverflow`] when full.
    pub fn ensure_room(&self) -> Result<(), CpuError> {
        if self.items.len() >= self.capacity {
            return Err(CpuError::StackOverflow {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Pushes `value`.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::StackOverflow`] when full.
    pub fn push(&mut self, value: Word) -> Result<(), CpuError> {
        self.ensure_room()?;
        self.items.push(value);
        Ok(())
    }

    /// Pops the top value.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::StackUnderflow`] when empty.
    pub fn pop(&mut self) -> Result<Word, CpuError> {
        self.items.pop().ok_or(CpuError::StackUnderflow)
    }

    /// Returns the top value without removing it.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::StackUnderflow`] when empty.
    pub fn peek(&self) -> Result<Word, CpuError> {
        self.items.last().copied().ok_or(CpuError::StackUnderflow)
    }

    /// Empties the stack.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Stacked values, bottom first.
    #[must_use]
    pub fn items(&self) -> &[Word] {
        &self.items
    }
}
