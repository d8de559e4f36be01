//! Bit-exact instruction codec.
//!
//! Layout of one instruction:
//!
//! | byte | contents |
//! |------|----------|
//! | 0 | opcode id (bits 0-5) and operand count (bits 6-7) |
//! | 1 | two-bit operand tags, slot 0 in bits 0-1, slot 1 in bits 2-3 |
//! | 2.. | operand payloads in slot order |
//!
//! The type byte is always present, so the shortest instruction is two bytes.

use std::fmt;

use crate::encoding::{Opcode, OPCODE_ID_BITS, OPCODE_ID_MASK};
use crate::fault::{CpuError, DecodingError, EncodingError};

/// Number of header bytes preceding the operand payload.
pub const HEADER_BYTES: usize = 2;

/// Maximum number of operands one instruction can carry.
pub const MAX_OPERANDS: usize = 2;

/// Largest register id the 4-bit payload can hold.
pub const MAX_ENCODABLE_REGISTER: u8 = 0x0F;

const TAG_BITS: u8 = 2;
const TAG_MASK: u8 = 0b11;

/// Two-bit operand type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum OperandKind {
    /// Tag `00`, 1 payload byte.
    Register,
    /// Tag `01`, 4 payload bytes.
    Immediate,
    /// Tag `10`, 2 payload bytes.
    MemoryAddress,
    /// Tag `11`, 1 payload byte.
    RegisterMemory,
}

impl OperandKind {
    /// Decodes a 2-bit tag. Every tag value is assigned.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Self {
        match tag & TAG_MASK {
            0b00 => Self::Register,
            0b01 => Self::Immediate,
            0b10 => Self::MemoryAddress,
            _ => Self::RegisterMemory,
        }
    }

    /// Returns the 2-bit tag.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Register => 0b00,
            Self::Immediate => 0b01,
            Self::MemoryAddress => 0b10,
            Self::RegisterMemory => 0b11,
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub const fn payload_len(self) -> usize {
        match self {
            Self::Register | Self::RegisterMemory => 1,
            Self::Immediate => 4,
            Self::MemoryAddress => 2,
        }
    }
}

/// One typed instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operand {
    /// Register by id.
    Register(u8),
    /// Literal 32-bit value.
    Immediate(i32),
    /// Direct RAM address.
    MemoryAddress(u16),
    /// RAM address held in a register.
    RegisterMemory(u8),
}

impl Operand {
    /// Returns this operand's type tag.
    #[must_use]
    pub const fn kind(self) -> OperandKind {
        match self {
            Self::Register(_) => OperandKind::Register,
            Self::Immediate(_) => OperandKind::Immediate,
            Self::MemoryAddress(_) => OperandKind::MemoryAddress,
            Self::RegisterMemory(_) => OperandKind::RegisterMemory,
        }
    }

    fn write_payload(self, out: &mut Vec<u8>) {
        match self {
            Self::Register(id) | Self::RegisterMemory(id) => out.push(id & MAX_ENCODABLE_REGISTER),
            Self::Immediate(value) => out.extend_from_slice(&value.to_le_bytes()),
            Self::MemoryAddress(addr) => out.extend_from_slice(&addr.to_le_bytes()),
        }
    }

    fn read_payload(kind: OperandKind, bytes: &[u8]) -> Self {
        match kind {
            OperandKind::Register => Self::Register(bytes[0] & MAX_ENCODABLE_REGISTER),
            OperandKind::RegisterMemory => Self::RegisterMemory(bytes[0] & MAX_ENCODABLE_REGISTER),
            OperandKind::Immediate => {
                Self::Immediate(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            OperandKind::MemoryAddress => Self::MemoryAddress(u16::from_le_bytes([bytes[0], bytes[1]])),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(id) => write!(f, "r{id}"),
            Self::Immediate(value) => write!(f, "{value}"),
            Self::MemoryAddress(addr) => write!(f, "[{addr}]"),
            Self::RegisterMemory(id) => write!(f, "[r{id}]"),
        }
    }
}

/// Opcode plus zero to two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Instruction {
    opcode: Opcode,
    operands: [Option<Operand>; MAX_OPERANDS],
}

impl Instruction {
    /// Builds an instruction, checking that it is encodable.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] for more than two operands or a register id
    /// that does not fit the 4-bit payload.
    pub fn new(opcode: Opcode, operands: &[Operand]) -> Result<Self, EncodingError> {
        if operands.len() > MAX_OPERANDS {
            return Err(EncodingError::TooManyOperands {
                count: operands.len(),
            });
        }
        let mut slots = [None; MAX_OPERANDS];
        for (slot, operand) in slots.iter_mut().zip(operands) {
            if let Operand::Register(id) | Operand::RegisterMemory(id) = *operand {
                if id > MAX_ENCODABLE_REGISTER {
                    return Err(EncodingError::RegisterOutOfRange(id));
                }
            }
            *slot = Some(*operand);
        }
        Ok(Self {
            opcode,
            operands: slots,
        })
    }

    /// Operand-less instruction.
    #[must_use]
    pub const fn bare(opcode: Opcode) -> Self {
        Self {
            opcode,
            operands: [None; MAX_OPERANDS],
        }
    }

    /// Returns the opcode.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Returns the operand in `index`, if present.
    #[must_use]
    pub fn operand(&self, index: usize) -> Option<Operand> {
        self.operands.get(index).copied().flatten()
    }

    /// Iterates over the present operands in slot order.
    pub fn operands(&self) -> impl Iterator<Item = Operand> + '_ {
        self.operands.iter().map_while(|slot| *slot)
    }

    /// Number of operands carried.
    #[must_use]
    pub fn operand_count(&self) -> usize {
        self.operands().count()
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_BYTES
            + self
                .operands()
                .map(|operand| operand.kind().payload_len())
                .sum::<usize>()
    }

    /// Serializes the instruction into its binary form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        let mut count = 0_u8;
        let mut tags = 0_u8;
        for operand in self.operands() {
            tags |= operand.kind().tag() << (TAG_BITS * count);
            count += 1;
        }
        out.push(self.opcode.id() | (count << OPCODE_ID_BITS));
        out.push(tags);
        for operand in self.operands() {
            operand.write_payload(&mut out);
        }
        out
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for (index, operand) in self.operands().enumerate() {
            let sep = if index == 0 { " " } else { ", " };
            write!(f, "{sep}{operand}")?;
        }
        Ok(())
    }
}

/// Encodes an opcode and its operands.
///
/// # Errors
///
/// Returns [`EncodingError`] when the instruction shape is not encodable.
pub fn encode(opcode: Opcode, operands: &[Operand]) -> Result<Vec<u8>, EncodingError> {
    Instruction::new(opcode, operands).map(|instruction| instruction.to_bytes())
}

/// Computes the full instruction length from the two header bytes.
///
/// # Errors
///
/// Returns [`DecodingError::InvalidOperandCount`] when the count field is 3.
pub fn instruction_length(header0: u8, header1: u8) -> Result<usize, DecodingError> {
    let count = header0 >> OPCODE_ID_BITS;
    if usize::from(count) > MAX_OPERANDS {
        return Err(DecodingError::InvalidOperandCount(count));
    }
    let payload: usize = (0..count)
        .map(|slot| OperandKind::from_tag(header1 >> (TAG_BITS * slot)).payload_len())
        .sum();
    Ok(HEADER_BYTES + payload)
}

/// Length of the instruction starting at `bytes[0]`, as the engine fetches it.
///
/// A zero-operand header may stand alone as the last byte of ROM; every
/// other instruction must fit entirely in `bytes`.
///
/// # Errors
///
/// Returns [`DecodingError::Empty`] for an empty slice, and
/// [`DecodingError::Truncated`] or [`DecodingError::InvalidOperandCount`]
/// when the header describes more bytes than remain.
pub fn fetch_length(bytes: &[u8]) -> Result<usize, DecodingError> {
    let (&header0, rest) = bytes.split_first().ok_or(DecodingError::Empty)?;
    let available = bytes.len();
    if header0 >> OPCODE_ID_BITS == 0 {
        return Ok(available.min(HEADER_BYTES));
    }
    let header1 = rest.first().copied().unwrap_or(0);
    let needed = instruction_length(header0, header1)?;
    if needed > available {
        return Err(DecodingError::Truncated { needed, available });
    }
    Ok(needed)
}

/// Decodes exactly one instruction from `bytes`.
///
/// # Errors
///
/// Returns [`CpuError::InvalidOpcode`] for unassigned ids and
/// [`CpuError::Decoding`] for malformed counts, truncation or leftover bytes.
pub fn decode(bytes: &[u8]) -> Result<Instruction, CpuError> {
    let (&header0, rest) = bytes.split_first().ok_or(DecodingError::Empty)?;
    let id = header0 & OPCODE_ID_MASK;
    let opcode = Opcode::from_id(id).ok_or(CpuError::InvalidOpcode(id))?;
    let count = header0 >> OPCODE_ID_BITS;

    if count == 0 {
        let consumed = match rest.first() {
            Some(0) => 1,
            _ => 0,
        };
        if rest.len() > consumed {
            return Err(DecodingError::TrailingBytes(rest.len() - consumed).into());
        }
        return Ok(Instruction::bare(opcode));
    }

    let &header1 = rest.first().ok_or(DecodingError::Truncated {
        needed: HEADER_BYTES,
        available: bytes.len(),
    })?;
    let needed = instruction_length(header0, header1)?;
    if bytes.len() < needed {
        return Err(DecodingError::Truncated {
            needed,
            available: bytes.len(),
        }
        .into());
    }
    if bytes.len() > needed {
        return Err(DecodingError::TrailingBytes(bytes.len() - needed).into());
    }

    let mut operands = [None; MAX_OPERANDS];
    let mut cursor = HEADER_BYTES;
    for slot in 0..count {
        let kind = OperandKind::from_tag(header1 >> (TAG_BITS * slot));
        let len = kind.payload_len();
        operands[usize::from(slot)] = Some(Operand::read_payload(kind, &bytes[cursor..cursor + len]));
        cursor += len;
    }
    Ok(Instruction { opcode, operands })
}

#[cfg(test)]
mod tests {
    use super::{
        decode, encode, fetch_length, instruction_length, Instruction, Operand, OperandKind,
    };
    use crate::encoding::Opcode;
    use crate::fault::{CpuError, DecodingError, EncodingError};

    #[test]
    fn mov_register_immediate_matches_reference_bytes() {
        let bytes = encode(Opcode::Mov, &[Operand::Register(0), Operand::Immediate(10)])
            .expect("encodable");
        assert_eq!(bytes, vec![0x81, 0x04, 0x00, 0x0A, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn operand_less_instruction_still_emits_type_byte() {
        let bytes = encode(Opcode::Hlt, &[]).expect("encodable");
        assert_eq!(bytes, vec![34, 0]);
        assert_eq!(decode(&bytes), Ok(Instruction::bare(Opcode::Hlt)));
        assert_eq!(decode(&[34]), Ok(Instruction::bare(Opcode::Hlt)));
    }

    #[test]
    fn memory_forms_use_expected_payload_widths() {
        let bytes = encode(
            Opcode::Str,
            &[Operand::MemoryAddress(0x1234), Operand::RegisterMemory(3)],
        )
        .expect("encodable");
        assert_eq!(bytes, vec![0x80 | 21, 0b1110, 0x34, 0x12, 0x03]);
        assert_eq!(instruction_length(bytes[0], bytes[1]), Ok(bytes.len()));
    }

    #[test]
    fn negative_immediates_round_trip_as_twos_complement() {
        let bytes = encode(Opcode::Push, &[Operand::Immediate(-2)]).expect("encodable");
        assert_eq!(&bytes[2..], &[0xFE, 0xFF, 0xFF, 0xFF]);
        let decoded = decode(&bytes).expect("decodable");
        assert_eq!(decoded.operand(0), Some(Operand::Immediate(-2)));
    }

    #[test]
    fn rejects_unencodable_shapes() {
        let three = [Operand::Register(0); 3];
        assert_eq!(
            encode(Opcode::Add, &three),
            Err(EncodingError::TooManyOperands { count: 3 })
        );
        assert_eq!(
            encode(Opcode::Inc, &[Operand::Register(16)]),
            Err(EncodingError::RegisterOutOfRange(16))
        );
    }

    #[test]
    fn decode_reports_malformed_input() {
        assert_eq!(decode(&[]), Err(DecodingError::Empty.into()));
        assert_eq!(decode(&[63, 0]), Err(CpuError::InvalidOpcode(63)));
        assert_eq!(
            decode(&[0xC0 | 1, 0]),
            Err(DecodingError::InvalidOperandCount(3).into())
        );
        assert_eq!(
            decode(&[0x40 | 14, 0x01, 0x05]),
            Err(DecodingError::Truncated {
                needed: 6,
                available: 3
            }
            .into())
        );
        assert_eq!(
            decode(&[0x40 | 40, 0x00, 0x02, 0xFF]),
            Err(DecodingError::TrailingBytes(1).into())
        );
        assert_eq!(decode(&[0, 0, 0]), Err(DecodingError::TrailingBytes(1).into()));
    }

    #[test]
    fn display_uses_assembly_syntax() {
        let instruction = Instruction::new(
            Opcode::Ldr,
            &[Operand::Register(1), Operand::RegisterMemory(2)],
        )
        .expect("encodable");
        assert_eq!(instruction.to_string(), "LDR r1, [r2]");
        assert_eq!(Instruction::bare(Opcode::Ret).to_string(), "RET");
    }

    #[test]
    fn every_tag_has_a_kind() {
        for tag in 0..4 {
            assert_eq!(OperandKind::from_tag(tag).tag(), tag);
        }
    }

    #[test]
    fn fetch_length_allows_a_lone_bare_header() {
        assert_eq!(fetch_length(&[34]), Ok(1));
        assert_eq!(fetch_length(&[34, 0, 34]), Ok(2));
        assert_eq!(fetch_length(&[]), Err(DecodingError::Empty));
        assert_eq!(
            fetch_length(&[0x40 | 9, 0x01]),
            Err(DecodingError::Truncated {
                needed: 6,
                available: 2
            })
        );
    }
}
