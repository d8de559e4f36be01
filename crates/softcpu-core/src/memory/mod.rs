//! Memory resources owned by the execution engine.

/// Sparse bounds-checked RAM.
pub mod ram;
/// Immutable program image.
pub mod rom;
/// Bounded call/data stack.
pub mod stack;

pub use ram::{Ram, DEFAULT_RAM_SIZE};
pub use rom::Rom;
pub use stack::{Stack, DEFAULT_STACK_SIZE};
