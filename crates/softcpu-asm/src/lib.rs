//! Two-pass assembler for the softcpu instruction set.
//!
//! [`assembler::assemble_source`] turns assembly text into a ROM image that
//! `softcpu_core::Cpu` executes directly. [`config`] loads the shared
//! `CpuConfig` from JSON for the `softcpu` binary.

/// Top-level two-pass assembler pipeline.
pub mod assembler;
/// JSON configuration loading.
pub mod config;
/// Pass-2 label resolution and instruction encoding.
pub mod encoder;
/// Structured assembly error types.
pub mod errors;
/// Line parser for labels, mnemonics and operands.
pub mod parser;
/// Line splitting, comment stripping and tokenizing.
pub mod source;
/// Symbol table and pass-1 offset assignment.
pub mod symbols;

pub use assembler::{assemble, assemble_source, AssembleResult, AssemblerConfig, ListingEntry};
pub use errors::{AssembleError, AssembleErrorKind, SourceLocation};
