//! Assembly source line parser for labels, mnemonics and operands.
//!
//! Parsing resolves everything that does not depend on label offsets:
//! mnemonics, registers, memory addresses and numeric immediates. Bare
//! identifiers become [`Arg::Label`] references resolved in pass 2.

use softcpu_core::{MAX_OPERANDS, Opcode, OperandKind, RegisterFile};
use thiserror::Error;

use crate::source::{strip_comment, tokenize};

/// Smallest accepted immediate literal.
pub const IMMEDIATE_MIN: i64 = i32::MIN as i64;

/// Largest accepted immediate literal (stored as its 32-bit pattern).
pub const IMMEDIATE_MAX: i64 = u32::MAX as i64;

/// A parsed operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// `rN`.
    Register(u8),
    /// `[rN]`.
    RegisterMemory(u8),
    /// `[N]`.
    MemoryAddress(u16),
    /// Numeric literal as a 32-bit pattern.
    Immediate(i32),
    /// Label reference, encoded as an immediate byte offset.
    Label(String),
}

impl Arg {
    /// Operand kind this argument encodes as.
    #[must_use]
    pub const fn kind(&self) -> OperandKind {
        match self {
            Self::Register(_) => OperandKind::Register,
            Self::RegisterMemory(_) => OperandKind::RegisterMemory,
            Self::MemoryAddress(_) => OperandKind::MemoryAddress,
            Self::Immediate(_) | Self::Label(_) => OperandKind::Immediate,
        }
    }
}

/// An instruction with parsed operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstruction {
    /// Resolved opcode.
    pub opcode: Opcode,
    /// Operands in source order.
    pub args: Vec<Arg>,
}

/// One parsed source line. Both parts are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLine {
    /// Label defined at the start of the line.
    pub label: Option<String>,
    /// Instruction following the label, if any.
    pub instruction: Option<ParsedInstruction>,
}

impl ParsedLine {
    /// Returns `true` for blank and comment-only lines.
    #[must_use]
    pub const fn is_blank(&self) -> bool {
        self.label.is_none() && self.instruction.is_none()
    }
}

/// A parsed line together with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-indexed source line number.
    pub line: usize,
    /// Original line text.
    pub text: String,
    /// Parsed content.
    pub parsed: ParsedLine,
}

/// Classification of parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Mnemonic not in the opcode table.
    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),
    /// Register-shaped token outside the configured register file.
    #[error("invalid register '{0}'")]
    InvalidRegister(String),
    /// Token is neither a number nor a label name.
    #[error("invalid immediate value '{0}'")]
    InvalidImmediate(String),
    /// Numeric literal outside `[-2^31, 2^32 - 1]`.
    #[error("immediate '{0}' out of 32-bit range")]
    ImmediateOutOfRange(String),
    /// Memory address outside `[0, 65535]`.
    #[error("memory address '{0}' out of 16-bit range")]
    AddressOutOfRange(String),
    /// Unbalanced or empty brackets.
    #[error("malformed memory operand '{0}'")]
    MalformedBracket(String),
    /// Label name is not an identifier or collides with a register name.
    #[error("invalid label name '{0}'")]
    InvalidLabel(String),
    /// More than two operands.
    #[error("too many operands ({0}, at most 2)")]
    TooManyOperands(usize),
}

/// Parses one source line against a register file of `register_count`.
///
/// # Errors
///
/// Returns a [`ParseError`] for unknown mnemonics, bad operands or an invalid
/// label definition.
pub fn parse_line(line: &str, register_count: usize) -> Result<ParsedLine, ParseError> {
    let tokens = tokenize(strip_comment(line));
    let mut rest = tokens.as_slice();
    let mut parsed = ParsedLine::default();

    if let Some(name) = rest.first().and_then(|token| token.strip_suffix(':')) {
        if !is_valid_label(name) {
            return Err(ParseError::InvalidLabel(name.to_string()));
        }
        parsed.label = Some(name.to_string());
        rest = &rest[1..];
    }

    let Some((mnemonic, operands)) = rest.split_first() else {
        return Ok(parsed);
    };
    let opcode = Opcode::from_mnemonic(mnemonic)
        .ok_or_else(|| ParseError::UnknownMnemonic(mnemonic.clone()))?;
    if operands.len() > MAX_OPERANDS {
        return Err(ParseError::TooManyOperands(operands.len()));
    }
    let args = operands
        .iter()
        .map(|token| parse_arg(token, register_count))
        .collect::<Result<Vec<_>, _>>()?;

    parsed.instruction = Some(ParsedInstruction { opcode, args });
    Ok(parsed)
}

/// Parses a single operand token.
///
/// # Errors
///
/// Returns a [`ParseError`] when the token is not a valid operand.
pub fn parse_arg(token: &str, register_count: usize) -> Result<Arg, ParseError> {
    if let Some(open) = token.strip_prefix('[') {
        let inner = open
            .strip_suffix(']')
            .filter(|inner| !inner.is_empty() && !inner.contains(['[', ']']))
            .ok_or_else(|| ParseError::MalformedBracket(token.to_string()))?;
        if let Some(id) = parse_register(inner, register_count)? {
            return Ok(Arg::RegisterMemory(id));
        }
        let value = parse_integer(inner)
            .ok_or_else(|| ParseError::MalformedBracket(token.to_string()))?;
        return u16::try_from(value)
            .map(Arg::MemoryAddress)
            .map_err(|_| ParseError::AddressOutOfRange(token.to_string()));
    }
    if token.contains(['[', ']']) {
        return Err(ParseError::MalformedBracket(token.to_string()));
    }
    if let Some(id) = parse_register(token, register_count)? {
        return Ok(Arg::Register(id));
    }
    if let Some(value) = parse_integer(token) {
        return immediate_bits(value)
            .map(Arg::Immediate)
            .ok_or_else(|| ParseError::ImmediateOutOfRange(token.to_string()));
    }
    if is_identifier(token) {
        return Ok(Arg::Label(token.to_string()));
    }
    Err(ParseError::InvalidImmediate(token.to_string()))
}

/// Parses a decimal or `0x` hexadecimal integer with an optional sign.
#[must_use]
pub fn parse_integer(token: &str) -> Option<i64> {
    let (negative, body) = match token.as_bytes().first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };
    let magnitude = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        i64::from_str_radix(hex, 16).ok()?
    } else {
        if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        body.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Folds an accepted literal into its 32-bit two's-complement pattern.
///
/// Returns `None` outside `[IMMEDIATE_MIN, IMMEDIATE_MAX]`.
#[must_use]
pub fn immediate_bits(value: i64) -> Option<i32> {
    if !(IMMEDIATE_MIN..=IMMEDIATE_MAX).contains(&value) {
        return None;
    }
    let pattern = if value > i64::from(i32::MAX) {
        value - (1_i64 << 32)
    } else {
        value
    };
    i32::try_from(pattern).ok()
}

/// Returns `true` when `name` can be defined as a label.
#[must_use]
pub fn is_valid_label(name: &str) -> bool {
    is_identifier(name) && RegisterFile::parse_name(name).is_none()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_register(token: &str, register_count: usize) -> Result<Option<u8>, ParseError> {
    let Some(id) = RegisterFile::parse_name(token) else {
        return Ok(None);
    };
    if id >= register_count {
        return Err(ParseError::InvalidRegister(token.to_string()));
    }
    u8::try_from(id)
        .map(Some)
        .map_err(|_| ParseError::InvalidRegister(token.to_string()))
}
