//! Instruction word field extraction and the immediate extractor.
//!
//! An instruction word is opaque everywhere except here and in the control unit.

use ux::{u3, u5, u7};

use crate::registers::RegisterMapping;

/// `ADDI x0, x0, 0`, the canonical no-op, also returned for fetches outside the program.
pub const NOP: u32 = 0x0000_0013;
/// the environment call encoding
pub const ECALL: u32 = 0x0000_0073;
/// the breakpoint encoding
pub const EBREAK: u32 = 0x0010_0073;

/// major opcodes of the RV32I base integer ISA
pub mod opcodes {
    pub const LUI: u8 = 0b0110111;
    pub const AUIPC: u8 = 0b0010111;
    pub const JAL: u8 = 0b1101111;
    pub const JALR: u8 = 0b1100111;
    pub const BRANCH: u8 = 0b1100011;
    pub const LOAD: u8 = 0b0000011;
    pub const STORE: u8 = 0b0100011;
    pub const OP_IMM: u8 = 0b0010011;
    pub const OP: u8 = 0b0110011;
    pub const MISC_MEM: u8 = 0b0001111;
    pub const SYSTEM: u8 = 0b1110011;
}

/// The encoding format of an instruction, which determines where its operands and immediate live.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Format {
    R,
    I,
    S,
    B,
    U,
    J,
}

impl Format {
    /// the format used by a major opcode, `None` for opcodes outside RV32I
    #[must_use]
    pub fn of(opcode: u7) -> Option<Self> {
        match u8::from(opcode) {
            opcodes::OP => Some(Self::R),
            opcodes::OP_IMM
            | opcodes::LOAD
            | opcodes::JALR
            | opcodes::MISC_MEM
            | opcodes::SYSTEM => Some(Self::I),
            opcodes::STORE => Some(Self::S),
            opcodes::BRANCH => Some(Self::B),
            opcodes::LUI | opcodes::AUIPC => Some(Self::U),
            opcodes::JAL => Some(Self::J),
            _ => None,
        }
    }
}

#[must_use]
pub fn opcode(word: u32) -> u7 {
    u7::new((word & 0x7f) as u8)
}

#[must_use]
pub fn rd(word: u32) -> RegisterMapping {
    u5::new(((word >> 7) & 0x1f) as u8).into()
}

#[must_use]
pub fn funct3(word: u32) -> u3 {
    u3::new(((word >> 12) & 0x7) as u8)
}

#[must_use]
pub fn rs1(word: u32) -> RegisterMapping {
    u5::new(((word >> 15) & 0x1f) as u8).into()
}

#[must_use]
pub fn rs2(word: u32) -> RegisterMapping {
    u5::new(((word >> 20) & 0x1f) as u8).into()
}

#[must_use]
pub fn funct7(word: u32) -> u7 {
    u7::new((word >> 25) as u8)
}

/// The immediate extractor.
///
/// Reassembles the immediate bits scattered by `format` and sign-extends them to 32 bits.
/// U-type immediates are already the upper 20 bits and need no extension, R-type has none.
#[must_use]
pub fn extract_immediate(word: u32, format: Format) -> u32 {
    let signed = word as i32;
    match format {
        Format::R => 0,
        Format::I => (signed >> 20) as u32,
        Format::S => ((signed >> 25) << 5) as u32 | ((word >> 7) & 0x1f),
        Format::B => {
            ((signed >> 31) << 12) as u32
                | ((word >> 7) & 0x1) << 11
                | ((word >> 25) & 0x3f) << 5
                | ((word >> 8) & 0xf) << 1
        }
        Format::U => word & 0xffff_f000,
        Format::J => {
            ((signed >> 31) << 20) as u32
                | (word & 0x000f_f000)
                | ((word >> 20) & 0x1) << 11
                | ((word >> 21) & 0x3ff) << 1
        }
    }
}

/// An instruction split into the fields its format defines.
///
/// Immediates are stored already extracted and sign-extended.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Instruction {
    RType {
        funct7: u7,
        rs2: RegisterMapping,
        rs1: RegisterMapping,
        funct3: u3,
        rd: RegisterMapping,
        opcode: u7,
    },
    IType {
        imm: u32,
        rs1: RegisterMapping,
        funct3: u3,
        rd: RegisterMapping,
        opcode: u7,
    },
    SType {
        imm: u32,
        rs2: RegisterMapping,
        rs1: RegisterMapping,
        funct3: u3,
        opcode: u7,
    },
    SBType {
        imm: u32,
        rs2: RegisterMapping,
        rs1: RegisterMapping,
        funct3: u3,
        opcode: u7,
    },
    UType {
        imm: u32,
        rd: RegisterMapping,
        opcode: u7,
    },
    UJType {
        imm: u32,
        rd: RegisterMapping,
        opcode: u7,
    },
    /// an opcode outside of RV32I, carries no operands
    Unknown { raw: u32 },
}

impl From<u32> for Instruction {
    fn from(word: u32) -> Self {
        let opcode = opcode(word);
        let Some(format) = Format::of(opcode) else {
            return Self::Unknown { raw: word };
        };
        let imm = extract_immediate(word, format);

        match format {
            Format::R => Self::RType {
                funct7: funct7(word),
                rs2: rs2(word),
                rs1: rs1(word),
                funct3: funct3(word),
                rd: rd(word),
                opcode,
            },
            Format::I => Self::IType {
                imm,
                rs1: rs1(word),
                funct3: funct3(word),
                rd: rd(word),
                opcode,
            },
            Format::S => Self::SType {
                imm,
                rs2: rs2(word),
                rs1: rs1(word),
                funct3: funct3(word),
                opcode,
            },
            Format::B => Self::SBType {
                imm,
                rs2: rs2(word),
                rs1: rs1(word),
                funct3: funct3(word),
                opcode,
            },
            Format::U => Self::UType {
                imm,
                rd: rd(word),
                opcode,
            },
            Format::J => Self::UJType {
                imm,
                rd: rd(word),
                opcode,
            },
        }
    }
}

impl Instruction {
    #[must_use]
    pub const fn opcode(&self) -> Option<u7> {
        match self {
            Self::RType { opcode, .. }
            | Self::IType { opcode, .. }
            | Self::SType { opcode, .. }
            | Self::SBType { opcode, .. }
            | Self::UType { opcode, .. }
            | Self::UJType { opcode, .. } => Some(*opcode),
            Self::Unknown { .. } => None,
        }
    }

    /// the destination register, if the format has one
    #[must_use]
    pub const fn rd(&self) -> Option<RegisterMapping> {
        match self {
            Self::RType { rd, .. }
            | Self::IType { rd, .. }
            | Self::UType { rd, .. }
            | Self::UJType { rd, .. } => Some(*rd),
            _ => None,
        }
    }

    /// the first source register, if the format reads one
    #[must_use]
    pub const fn rs1(&self) -> Option<RegisterMapping> {
        match self {
            Self::RType { rs1, .. }
            | Self::IType { rs1, .. }
            | Self::SType { rs1, .. }
            | Self::SBType { rs1, .. } => Some(*rs1),
            _ => None,
        }
    }

    /// the second source register, if the format reads one
    #[must_use]
    pub const fn rs2(&self) -> Option<RegisterMapping> {
        match self {
            Self::RType { rs2, .. } | Self::SType { rs2, .. } | Self::SBType { rs2, .. } => {
                Some(*rs2)
            }
            _ => None,
        }
    }

    #[must_use]
    pub const fn funct3(&self) -> Option<u3> {
        match self {
            Self::RType { funct3, .. }
            | Self::IType { funct3, .. }
            | Self::SType { funct3, .. }
            | Self::SBType { funct3, .. } => Some(*funct3),
            _ => None,
        }
    }

    /// funct7 for R-type; for I-type these are the upper immediate bits, which select
    /// between the logical and arithmetic immediate shifts.
    #[must_use]
    pub fn funct7(&self) -> Option<u7> {
        match self {
            Self::RType { funct7, .. } => Some(*funct7),
            Self::IType { imm, .. } => Some(u7::new(((imm >> 5) & 0x7f) as u8)),
            _ => None,
        }
    }

    /// the sign-extended immediate, 0 for formats without one
    #[must_use]
    pub const fn imm(&self) -> u32 {
        match self {
            Self::IType { imm, .. }
            | Self::SType { imm, .. }
            | Self::SBType { imm, .. }
            | Self::UType { imm, .. }
            | Self::UJType { imm, .. } => *imm,
            Self::RType { .. } | Self::Unknown { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_asm;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_r_type() {
        // sub x5, x1, x2
        let instruction = Instruction::from(0b01000000001000001000001010110011);
        assert_eq!(
            instruction,
            Instruction::RType {
                funct7: u7::new(0b0100000),
                rs2: RegisterMapping::Sp,
                rs1: RegisterMapping::Ra,
                funct3: u3::new(0),
                rd: RegisterMapping::T0,
                opcode: u7::new(opcodes::OP),
            }
        );
        assert_eq!(instruction.rd(), Some(RegisterMapping::T0));
        assert_eq!(instruction.imm(), 0);
    }

    #[test]
    fn test_decode_i_type() {
        // lw x3, 4(x10)
        let instruction = Instruction::from(0b00000000010001010010000110000011);
        assert_eq!(instruction.rd(), Some(RegisterMapping::Gp));
        assert_eq!(instruction.rs1(), Some(RegisterMapping::A0));
        assert_eq!(instruction.rs2(), None);
        assert_eq!(instruction.imm(), 4);

        // addi x1, x0, -1
        let instruction = Instruction::from(test_asm::addi(1, 0, -1));
        assert_eq!(instruction.imm(), u32::MAX);

        // srai x1, x2, 3 keeps funct7 in the upper immediate bits
        let instruction = Instruction::from(test_asm::srai(1, 2, 3));
        assert_eq!(instruction.funct7(), Some(u7::new(0b0100000)));
    }

    #[test]
    fn test_decode_s_type() {
        // sw x5, 0(x10)
        let instruction = Instruction::from(0b00000000010101010010000000100011);
        assert_eq!(instruction.rd(), None);
        assert_eq!(instruction.rs1(), Some(RegisterMapping::A0));
        assert_eq!(instruction.rs2(), Some(RegisterMapping::T0));
        assert_eq!(instruction.imm(), 0);

        assert_eq!(
            Instruction::from(test_asm::sw(2, 1, -12)).imm(),
            (-12i32) as u32
        );
    }

    #[test]
    fn test_decode_branch() {
        // beq x5, x3, 12
        let instruction = Instruction::from(0b00000000001100101000011001100011);
        assert_eq!(instruction.rs1(), Some(RegisterMapping::T0));
        assert_eq!(instruction.rs2(), Some(RegisterMapping::Gp));
        assert_eq!(instruction.imm(), 12);

        assert_eq!(
            Instruction::from(test_asm::bne(1, 2, -4096)).imm(),
            (-4096i32) as u32
        );
        assert_eq!(Instruction::from(test_asm::beq(1, 2, 4094)).imm(), 4094);
    }

    #[test]
    fn test_decode_jumps() {
        // jal x1, 8
        let instruction = Instruction::from(0b00000000100000000000000011101111);
        assert_eq!(instruction.rd(), Some(RegisterMapping::Ra));
        assert_eq!(instruction.rs1(), None);
        assert_eq!(instruction.imm(), 8);

        assert_eq!(
            Instruction::from(test_asm::jal(0, -(1 << 20))).imm(),
            (-(1i32 << 20)) as u32
        );
        assert_eq!(Instruction::from(test_asm::jal(0, 0x7fffe)).imm(), 0x7fffe);

        // jalr x1, x1, 0
        let instruction = Instruction::from(0b00000000000000001000000011100111);
        assert_eq!(instruction.rd(), Some(RegisterMapping::Ra));
        assert_eq!(instruction.rs1(), Some(RegisterMapping::Ra));
    }

    #[test]
    fn test_upper_immediate() {
        let instruction = Instruction::from(test_asm::lui(5, 0xfffff));
        assert_eq!(instruction.imm(), 0xffff_f000);
        assert_eq!(instruction.rs1(), None);
    }

    #[test]
    fn test_unknown_opcode() {
        let instruction = Instruction::from(0xffff_ffff);
        assert_eq!(instruction, Instruction::Unknown { raw: 0xffff_ffff });
        assert_eq!(instruction.opcode(), None);
        assert_eq!(instruction.rd(), None);
        assert_eq!(instruction.rs1(), None);
        assert_eq!(instruction.rs2(), None);
    }
}
