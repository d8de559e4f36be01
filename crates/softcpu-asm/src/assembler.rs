//! Top-level assembler pipeline.
//!
//! 1. **Parse**: every source line is tokenized and parsed independently.
//! 2. **Pass 1**: instruction sizes and label offsets are assigned.
//! 3. **Pass 2**: labels are resolved and instructions encoded.
//!
//! Any error aborts assembly; no partial ROM image is produced.

use std::fmt::Write as _;
use std::path::Path;

use log::debug;
use softcpu_core::{CpuConfig, DEFAULT_REGISTER_COUNT};

use crate::encoder::encode_instruction;
use crate::errors::{AssembleError, AssembleErrorKind, SourceLocation};
use crate::parser::{parse_line, Statement};
use crate::source::split_lines;
use crate::symbols::{assign_offsets, SymbolTable};

/// Assembler settings derived from the target CPU configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Size of the register file; `rN` with `N >= register_count` is rejected.
    pub register_count: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            register_count: DEFAULT_REGISTER_COUNT,
        }
    }
}

impl From<&CpuConfig> for AssemblerConfig {
    fn from(config: &CpuConfig) -> Self {
        Self {
            register_count: config.register_count,
        }
    }
}

/// One assembled instruction in the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Byte offset of the instruction in the ROM image.
    pub offset: usize,
    /// Encoded bytes.
    pub bytes: Vec<u8>,
    /// 1-indexed source line.
    pub line: usize,
    /// Source line text.
    pub source: String,
}

/// Result of assembly.
#[derive(Debug, Clone, Default)]
pub struct AssembleResult {
    /// ROM image bytes.
    pub binary: Vec<u8>,
    /// Label definitions.
    pub symbols: SymbolTable,
    /// One entry per emitted instruction, in offset order.
    pub listing: Vec<ListingEntry>,
}

impl AssembleResult {
    /// Renders the listing as `offset: bytes  source` lines.
    #[must_use]
    pub fn format_listing(&self) -> String {
        let width = self
            .listing
            .iter()
            .map(|entry| entry.bytes.len() * 3)
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        for entry in &self.listing {
            let hex = entry
                .bytes
                .iter()
                .map(|byte| format!("{byte:02X}"))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(
                out,
                "{:04X}: {hex:<width$} {}",
                entry.offset,
                entry.source.trim()
            );
        }
        out
    }
}

/// Assembles source text into a ROM image.
///
/// # Errors
///
/// Returns the first [`AssembleError`] in source order; parse errors are
/// reported before label errors.
#[allow(clippy::result_large_err)]
pub fn assemble_source(
    source: &str,
    config: &AssemblerConfig,
) -> Result<AssembleResult, AssembleError> {
    let statements = split_lines(source)
        .into_iter()
        .map(|line| {
            parse_line(&line.text, config.register_count)
                .map(|parsed| Statement {
                    line: line.number,
                    text: line.text.clone(),
                    parsed,
                })
                .map_err(|e| {
                    AssembleError::from(e).with_location(SourceLocation::new(line.number, &line.text))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let assignment = assign_offsets(&statements).map_err(|e| {
        let text = statements
            .iter()
            .find(|statement| statement.line == e.line)
            .map(|statement| statement.text.clone())
            .unwrap_or_default();
        let line = e.line;
        AssembleError::from(e).with_location(SourceLocation::new(line, text))
    })?;
    debug!(
        "pass 1: {} labels, {} bytes",
        assignment.symbols.len(),
        assignment.end_offset
    );

    let mut binary = Vec::with_capacity(assignment.end_offset);
    let mut listing = Vec::new();
    for (statement, &offset) in statements.iter().zip(&assignment.offsets) {
        let Some(instruction) = &statement.parsed.instruction else {
            continue;
        };
        let bytes = encode_instruction(instruction, &assignment.symbols).map_err(|e| {
            AssembleError::from(e)
                .with_location(SourceLocation::new(statement.line, &statement.text))
        })?;
        debug_assert_eq!(offset, binary.len());
        binary.extend_from_slice(&bytes);
        listing.push(ListingEntry {
            offset,
            bytes,
            line: statement.line,
            source: statement.text.clone(),
        });
    }
    debug!("pass 2: {} instructions encoded", listing.len());

    Ok(AssembleResult {
        binary,
        symbols: assignment.symbols,
        listing,
    })
}

/// Reads and assembles a source file.
///
/// # Errors
///
/// Returns [`AssembleErrorKind::Io`] if the file cannot be read, otherwise any
/// error from [`assemble_source`].
#[allow(clippy::result_large_err)]
pub fn assemble(path: &Path, config: &AssemblerConfig) -> Result<AssembleResult, AssembleError> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        AssembleError::new(AssembleErrorKind::Io(format!(
            "cannot read {}: {e}",
            path.display()
        )))
    })?;
    debug!("assembling {}", path.display());
    assemble_source(&source, config)
}

#[cfg(test)]
mod tests {
    use softcpu_core::CpuConfig;

    use super::{assemble_source, AssemblerConfig};
    use crate::errors::AssembleErrorKind;
    use crate::parser::ParseError;

    #[test]
    fn config_follows_cpu_register_count() {
        let cpu = CpuConfig {
            register_count: 4,
            ..CpuConfig::default()
        };
        assert_eq!(AssemblerConfig::from(&cpu).register_count, 4);
        assert_eq!(AssemblerConfig::default().register_count, 16);
    }

    #[test]
    fn listing_tracks_offsets_and_lines() {
        let result = assemble_source("; header\nMOV r0, 1\n\nloop: INC r0\nHLT\n", &AssemblerConfig::default())
            .expect("assembles");
        let offsets: Vec<_> = result.listing.iter().map(|e| (e.offset, e.line)).collect();
        assert_eq!(offsets, vec![(0, 2), (7, 4), (10, 5)]);
        assert_eq!(result.binary.len(), 12);
        assert_eq!(result.symbols["loop"].offset, 7);
    }

    #[test]
    fn formatted_listing_shows_hex_and_source() {
        let result = assemble_source("INC r1\nHLT", &AssemblerConfig::default()).expect("assembles");
        let listing = result.format_listing();
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000: 68 00 01"));
        assert!(lines[0].ends_with("INC r1"));
        assert!(lines[1].starts_with("0003: 22 00"));
    }

    #[test]
    fn register_limit_comes_from_config() {
        let config = AssemblerConfig { register_count: 2 };
        let err = assemble_source("MOV r2, 1", &config).unwrap_err();
        assert_eq!(
            err.kind,
            AssembleErrorKind::Parse(ParseError::InvalidRegister("r2".into()))
        );
        assert_eq!(err.line(), Some(1));
    }
}
