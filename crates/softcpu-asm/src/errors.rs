//! Structured error reporting for assembler phases.
//!
//! Every phase error is lifted into [`AssembleError`], which carries the
//! offending source line when one is known. `Display` renders
//!
//! ```text
//! line 4: unknown mnemonic 'FOO'
//!     FOO r0
//! ```
//!
//! while [`AssembleError::format_for_stderr`] renders the compiler-style
//! `file:line: error: message` used by the CLI.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::encoder::EncodeError;
use crate::parser::ParseError;
use crate::symbols::SymbolError;

/// A source position for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// 1-indexed line number.
    pub line: usize,
    /// Text of the offending line.
    pub text: String,
}

impl SourceLocation {
    /// Creates a new source location.
    #[must_use]
    pub fn new(line: usize, text: impl Into<String>) -> Self {
        Self {
            line,
            text: text.into(),
        }
    }
}

/// Classification of assembler errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleErrorKind {
    /// Source line could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Label table conflict.
    #[error(transparent)]
    Symbol(#[from] SymbolError),
    /// Label resolution or codec failure.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Source file could not be read.
    #[error("I/O error: {0}")]
    Io(String),
}

/// An assembler error with optional source context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleError {
    /// The kind of error.
    pub kind: AssembleErrorKind,
    /// Source location if available.
    pub location: Option<SourceLocation>,
}

impl AssembleError {
    /// Creates an error without a location.
    #[must_use]
    pub const fn new(kind: AssembleErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    /// Attaches a source location.
    #[must_use]
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Line number of the error, if known.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        self.location.as_ref().map(|location| location.line)
    }

    /// Formats the error as `file:line: error: message`.
    #[must_use]
    pub fn format_for_stderr(&self, file: &Path) -> String {
        self.location.as_ref().map_or_else(
            || format!("{}: error: {}", file.display(), self.kind),
            |location| {
                format!(
                    "{}:{}: error: {}",
                    file.display(),
                    location.line,
                    self.kind
                )
            },
        )
    }
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(
                f,
                "line {}: {}\n    {}",
                location.line,
                self.kind,
                location.text.trim()
            ),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AssembleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<ParseError> for AssembleError {
    fn from(e: ParseError) -> Self {
        Self::new(AssembleErrorKind::Parse(e))
    }
}

impl From<SymbolError> for AssembleError {
    fn from(e: SymbolError) -> Self {
        Self::new(AssembleErrorKind::Symbol(e))
    }
}

impl From<EncodeError> for AssembleError {
    fn from(e: EncodeError) -> Self {
        Self::new(AssembleErrorKind::Encode(e))
    }
}
