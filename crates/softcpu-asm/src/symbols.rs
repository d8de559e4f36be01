//! Symbol table and pass-1 offset assignment.
//!
//! Pass 1 walks the parsed statements, sizes every instruction from its
//! operand kinds and records the byte offset of each label definition.

use std::collections::HashMap;

use softcpu_core::HEADER_BYTES;

use crate::parser::{ParsedInstruction, Statement};

/// A label with its byte offset and definition line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Byte offset of the next instruction after the definition.
    pub offset: usize,
    /// Source line number where the label was defined.
    pub defined_at: usize,
}

/// Symbol table mapping label names to their definitions.
pub type SymbolTable = HashMap<String, Symbol>;

/// Error during symbol table construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolError {
    /// Kind of error.
    pub kind: SymbolErrorKind,
    /// Source line where the error occurred.
    pub line: usize,
}

/// Classification of symbol errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolErrorKind {
    /// Label defined more than once.
    DuplicateLabel {
        /// The label name.
        name: String,
        /// Line of the first definition.
        first_definition: usize,
    },
}

impl std::fmt::Display for SymbolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::fmt::Display for SymbolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateLabel {
                name,
                first_definition,
            } => write!(
                f,
                "duplicate label '{name}' (first defined at line {first_definition})"
            ),
        }
    }
}

impl std::error::Error for SymbolError {}

/// Result of pass 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    /// Byte offset of each statement, parallel to the input slice.
    pub offsets: Vec<usize>,
    /// Label definitions.
    pub symbols: SymbolTable,
    /// Offset one past the last emitted byte.
    pub end_offset: usize,
}

/// Encoded size of `instruction` in bytes.
#[must_use]
pub fn instruction_size(instruction: &ParsedInstruction) -> usize {
    HEADER_BYTES
        + instruction
            .args
            .iter()
            .map(|arg| arg.kind().payload_len())
            .sum::<usize>()
}

/// Assigns a byte offset to every statement and collects label definitions.
///
/// # Errors
///
/// Returns [`SymbolError`] when a label is defined twice.
pub fn assign_offsets(statements: &[Statement]) -> Result<Assignment, SymbolError> {
    let mut assignment = Assignment {
        offsets: Vec::with_capacity(statements.len()),
        ..Assignment::default()
    };
    let mut offset = 0_usize;

    for statement in statements {
        assignment.offsets.push(offset);

        if let Some(name) = &statement.parsed.label {
            if let Some(existing) = assignment.symbols.get(name) {
                return Err(SymbolError {
                    kind: SymbolErrorKind::DuplicateLabel {
                        name: name.clone(),
                        first_definition: existing.defined_at,
                    },
                    line: statement.line,
                });
            }
            assignment.symbols.insert(
                name.clone(),
                Symbol {
                    offset,
                    defined_at: statement.line,
                },
            );
        }

        if let Some(instruction) = &statement.parsed.instruction {
            offset += instruction_size(instruction);
        }
    }

    assignment.end_offset = offset;
    Ok(assignment)
}
