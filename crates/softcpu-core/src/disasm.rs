//! Instruction disassembly.
//!
//! Converts ROM bytes back into assembly text with a linear sweep. Bytes that
//! do not form a valid instruction are emitted one at a time as `.byte`
//! rows so the sweep always makes progress.

use crate::codec::{decode, fetch_length};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Byte offset of this instruction.
    pub addr_start: usize,
    /// Raw instruction bytes.
    pub bytes: Vec<u8>,
    /// The instruction mnemonic (e.g., "ADD", "MOV", ".byte").
    pub mnemonic: String,
    /// The formatted operands (e.g., "r0, 10").
    pub operands: String,
    /// Whether these bytes failed to decode.
    pub is_illegal: bool,
}

impl DisassemblyRow {
    /// Length in bytes.
    #[must_use]
    pub fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// `MNEMONIC operands` text.
    #[must_use]
    pub fn text(&self) -> String {
        if self.operands.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.operands)
        }
    }
}

/// Disassembles a whole ROM image.
#[must_use]
pub fn disassemble(rom: &[u8]) -> Vec<DisassemblyRow> {
    let mut rows = Vec::new();
    let mut pc = 0;
    while pc < rom.len() {
        let row = disassemble_one(pc, rom);
        pc += row.len_bytes();
        rows.push(row);
    }
    rows
}

/// Disassembles `before` rows before and `after` rows after the row
/// containing `center_pc`.
///
/// Row boundaries come from a sweep starting at offset 0, so the window lines
/// up with the instructions the engine actually fetches.
#[must_use]
pub fn disassemble_window(
    center_pc: usize,
    before: usize,
    after: usize,
    rom: &[u8],
) -> Vec<DisassemblyRow> {
    let rows = disassemble(rom);
    let Some(center) = rows
        .iter()
        .position(|row| (row.addr_start..row.addr_start + row.len_bytes()).contains(&center_pc))
    else {
        return Vec::new();
    };
    let start = center.saturating_sub(before);
    let end = (center + after + 1).min(rows.len());
    rows[start..end].to_vec()
}

fn disassemble_one(pc: usize, rom: &[u8]) -> DisassemblyRow {
    let header0 = rom[pc];
    let decoded = fetch_length(&rom[pc..])
        .ok()
        .and_then(|len| rom.get(pc..pc + len))
        .and_then(|bytes| decode(bytes).ok().map(|instr| (bytes, instr)));

    match decoded {
        Some((bytes, instr)) => DisassemblyRow {
            addr_start: pc,
            bytes: bytes.to_vec(),
            mnemonic: instr.opcode().mnemonic().to_string(),
            operands: instr
                .operands()
                .map(|operand| operand.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            is_illegal: false,
        },
        None => DisassemblyRow {
            addr_start: pc,
            bytes: vec![header0],
            mnemonic: ".byte".to_string(),
            operands: format!("0x{header0:02X}"),
            is_illegal: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{disassemble, disassemble_window};

    #[test]
    fn disassemble_mov_immediate() {
        let rom = [0x81, 0x04, 0x00, 0x0A, 0x00, 0x00, 0x00];
        let rows = disassemble(&rom);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mnemonic, "MOV");
        assert_eq!(rows[0].operands, "r0, 10");
        assert_eq!(rows[0].len_bytes(), 7);
        assert!(!rows[0].is_illegal);
    }

    #[test]
    fn disassemble_bare_halt() {
        let rows = disassemble(&[34, 0]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text(), "HLT");
    }

    #[test]
    fn lone_halt_byte_at_rom_end_disassembles_as_halt() {
        let rows = disassemble(&[0x00, 0x00, 34]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].text(), "HLT");
        assert_eq!(rows[1].bytes, vec![34]);
        assert!(!rows[1].is_illegal);
    }

    #[test]
    fn disassemble_illegal_opcode_advances_one_byte() {
        let rows = disassemble(&[63, 0, 34, 0]);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_illegal);
        assert_eq!(rows[0].text(), ".byte 0x3F");
        assert_eq!(rows[2].mnemonic, "HLT");
        assert_eq!(rows[2].addr_start, 2);
    }

    #[test]
    fn disassemble_truncated_tail() {
        let rows = disassemble(&[0x40 | 14, 0x01, 0x05]);
        assert!(rows.iter().all(|row| row.is_illegal));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn disassemble_memory_operands() {
        let rom = [0x80 | 21, 0b1110, 0x34, 0x12, 0x03];
        let rows = disassemble(&rom);
        assert_eq!(rows[0].text(), "STR [4660], [r3]");
    }

    #[test]
    fn disassemble_window_before_after() {
        let rom = [0, 0, 0, 0, 34, 0];
        let rows = disassemble_window(2, 1, 1, &rom);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].addr_start, 0);
        assert_eq!(rows[1].addr_start, 2);
        assert_eq!(rows[2].addr_start, 4);

        let clipped = disassemble_window(3, 5, 5, &rom);
        assert_eq!(clipped.len(), 3);
        assert!(disassemble_window(10, 1, 1, &rom).is_empty());
    }
}
