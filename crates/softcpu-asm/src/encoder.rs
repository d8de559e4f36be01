//! Pass-2 encoding: label resolution and instruction byte emission.

use softcpu_core::{encode, EncodingError, Operand};
use thiserror::Error;

use crate::parser::{Arg, ParsedInstruction};
use crate::symbols::SymbolTable;

/// Errors raised while encoding a parsed instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Label referenced but never defined.
    #[error("undefined label '{0}'")]
    UndefinedLabel(String),
    /// Label offset does not fit a 32-bit immediate.
    #[error("label '{name}' at offset {offset} does not fit a 32-bit immediate")]
    LabelOutOfRange {
        /// The label name.
        name: String,
        /// Its byte offset.
        offset: usize,
    },
    /// Operand shape rejected by the codec.
    #[error(transparent)]
    Codec(#[from] EncodingError),
}

/// Resolves one argument into a codec operand.
///
/// # Errors
///
/// Returns [`EncodeError`] for undefined or unrepresentable labels.
pub fn resolve_arg(arg: &Arg, symbols: &SymbolTable) -> Result<Operand, EncodeError> {
    Ok(match arg {
        Arg::Register(id) => Operand::Register(*id),
        Arg::RegisterMemory(id) => Operand::RegisterMemory(*id),
        Arg::MemoryAddress(address) => Operand::MemoryAddress(*address),
        Arg::Immediate(value) => Operand::Immediate(*value),
        Arg::Label(name) => {
            let symbol = symbols
                .get(name)
                .ok_or_else(|| EncodeError::UndefinedLabel(name.clone()))?;
            let value = i32::try_from(symbol.offset).map_err(|_| EncodeError::LabelOutOfRange {
                name: name.clone(),
                offset: symbol.offset,
            })?;
            Operand::Immediate(value)
        }
    })
}

/// Encodes `instruction` with labels resolved against `symbols`.
///
/// # Errors
///
/// Returns [`EncodeError`] when a label is unresolved or the codec rejects
/// the operand shape.
pub fn encode_instruction(
    instruction: &ParsedInstruction,
    symbols: &SymbolTable,
) -> Result<Vec<u8>, EncodeError> {
    let operands = instruction
        .args
        .iter()
        .map(|arg| resolve_arg(arg, symbols))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(encode(instruction.opcode, &operands)?)
}
