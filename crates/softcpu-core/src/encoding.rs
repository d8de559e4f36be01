//! Opcode identity table.
//!
//! Every opcode owns a fixed 6-bit identity number. The table below is the
//! single source of truth for both the codec and the assembler's mnemonic
//! lookup; ids not listed are illegal.

use std::fmt;

/// Width of the opcode field in the first header byte.
pub const OPCODE_ID_BITS: u8 = 6;

/// Mask selecting the opcode id from the first header byte.
pub const OPCODE_ID_MASK: u8 = (1 << OPCODE_ID_BITS) - 1;

/// Closed set of operations understood by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    Nop = 0,
    Mov = 1,
    Add = 2,
    Sub = 3,
    Mul = 4,
    Div = 5,
    And = 6,
    Or = 7,
    Cmp = 8,
    Jmp = 9,
    Jz = 10,
    Jnz = 11,
    Call = 12,
    Ret = 13,
    Push = 14,
    Pop = 15,
    Xor = 16,
    Nand = 17,
    Nor = 18,
    Xnor = 19,
    Ldr = 20,
    Str = 21,
    Jnn = 22,
    Jn = 23,
    Jo = 24,
    Jno = 25,
    Not = 26,
    Shl = 27,
    Shr = 28,
    Dsp = 29,
    Cls = 30,
    Bfr = 31,
    Sb = 32,
    Col = 33,
    Hlt = 34,
    Adi = 35,
    Sbi = 36,
    Neg = 37,
    Jc = 38,
    Jnc = 39,
    Inc = 40,
    Dec = 41,
    Clr = 42,
    Mod = 43,
    Prt = 44,
    Rnd = 45,
    Test = 46,
}

/// Assigned `(id, mnemonic, opcode)` triples in id order.
///
/// Any id not present here decodes to an invalid-opcode fault.
pub const OPCODE_TABLE: &[(u8, &str, Opcode)] = &[
    (0, "NOP", Opcode::Nop),
    (1, "MOV", Opcode::Mov),
    (2, "ADD", Opcode::Add),
    (3, "SUB", Opcode::Sub),
    (4, "MUL", Opcode::Mul),
    (5, "DIV", Opcode::Div),
    (6, "AND", Opcode::And),
    (7, "OR", Opcode::Or),
    (8, "CMP", Opcode::Cmp),
    (9, "JMP", Opcode::Jmp),
    (10, "JZ", Opcode::Jz),
    (11, "JNZ", Opcode::Jnz),
    (12, "CALL", Opcode::Call),
    (13, "RET", Opcode::Ret),
    (14, "PUSH", Opcode::Push),
    (15, "POP", Opcode::Pop),
    (16, "XOR", Opcode::Xor),
    (17, "NAND", Opcode::Nand),
    (18, "NOR", Opcode::Nor),
    (19, "XNOR", Opcode::Xnor),
    (20, "LDR", Opcode::Ldr),
    (21, "STR", Opcode::Str),
    (22, "JNN", Opcode::Jnn),
    (23, "JN", Opcode::Jn),
    (24, "JO", Opcode::Jo),
    (25, "JNO", Opcode::Jno),
    (26, "NOT", Opcode::Not),
    (27, "SHL", Opcode::Shl),
    (28, "SHR", Opcode::Shr),
    (29, "DSP", Opcode::Dsp),
    (30, "CLS", Opcode::Cls),
    (31, "BFR", Opcode::Bfr),
    (32, "SB", Opcode::Sb),
    (33, "COL", Opcode::Col),
    (34, "HLT", Opcode::Hlt),
    (35, "ADI", Opcode::Adi),
    (36, "SBI", Opcode::Sbi),
    (37, "NEG", Opcode::Neg),
    (38, "JC", Opcode::Jc),
    (39, "JNC", Opcode::Jnc),
    (40, "INC", Opcode::Inc),
    (41, "DEC", Opcode::Dec),
    (42, "CLR", Opcode::Clr),
    (43, "MOD", Opcode::Mod),
    (44, "PRT", Opcode::Prt),
    (45, "RND", Opcode::Rnd),
    (46, "TEST", Opcode::Test),
];

impl Opcode {
    /// Returns the 6-bit identity number.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Looks up an opcode by identity number.
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        OPCODE_TABLE
            .get(usize::from(id))
            .map(|(_, _, opcode)| *opcode)
    }

    /// Canonical upper-case mnemonic.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        OPCODE_TABLE[usize::from(self.id())].1
    }

    /// Resolves a mnemonic, ignoring ASCII case.
    #[must_use]
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        OPCODE_TABLE
            .iter()
            .find_map(|(_, mnemonic, opcode)| mnemonic.eq_ignore_ascii_case(name).then_some(*opcode))
    }

    /// Returns true for opcodes that overwrite the program counter.
    #[must_use]
    pub const fn is_control_flow(self) -> bool {
        matches!(
            self,
            Self::Jmp
                | Self::Jz
                | Self::Jnz
                | Self::Jn
                | Self::Jnn
                | Self::Jo
                | Self::Jno
                | Self::Jc
                | Self::Jnc
                | Self::Call
                | Self::Ret
        )
    }

    /// Returns true for opcodes forwarded to the display capability.
    #[must_use]
    pub const fn is_display(self) -> bool {
        matches!(
            self,
            Self::Dsp | Self::Cls | Self::Bfr | Self::Sb | Self::Col
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
