//! The control-signal bundle and the main control unit that produces it.

use log::trace;
use ux::{u3, u7};

use crate::{
    alu::{alu_control_unit, ALUControl, ALUOp},
    instruction::{opcodes, Instruction},
    registers::RegisterMapping,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
/// a struct that holds the control signals that the Control Unit generates.
///
/// The default value is the inert bundle: an instruction carrying it has no architectural effect.
pub struct ControlSignals {
    /// tells the register file to write to the register specified by the instruction.
    pub reg_write: bool,
    /// tells the ALU whether its first operand is rs1 or the instruction's own PC.
    pub alu_src_a: ALUSrcA,
    /// The ALUSrc signal is a 1 bit signal that tells the ALU whether to use the register value (0) or the immediate value (1) as the second operand.
    pub alu_src: ALUSrc,
    /// the category of operation, as seen by the ALU control unit.
    pub alu_op: ALUOp,
    /// the concrete operation the ALU performs.
    pub alu_control: ALUControl,
    /// The mem_read signal is a 1 bit signal that tells the data memory unit whether to read from memory.
    pub mem_read: bool,
    /// The mem_write signal is a 1 bit signal that tells the data memory unit whether to write to memory.
    pub mem_write: bool,
    /// how many bytes a load or store moves.
    pub mem_width: MemWidth,
    /// whether a sub-word load is sign-extended (LB, LH) or zero-extended (LBU, LHU).
    pub mem_signed: bool,
    /// which value the write back stage commits to the register file.
    pub write_source: WriteSource,
    /// how (and whether) this instruction redirects the PC.
    pub branch_type: BranchType,
    /// the predicate of a conditional branch.
    pub branch_condition: BranchCondition,
    /// set for the environment call and breakpoint encodings, the harness stops when one retires.
    pub halt: bool,
}

impl ControlSignals {
    /// whether any of the bits that can change architectural state are set.
    #[must_use]
    pub const fn has_effect(&self) -> bool {
        self.reg_write
            || self.mem_read
            || self.mem_write
            || !matches!(self.branch_type, BranchType::None)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[repr(u8)]
/// a 1 bit signal that tells the ALU whether to use the register value (0) or the immediate value (1) as the second operand.
pub enum ALUSrc {
    #[default]
    Register = 0,
    Immediate = 1,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[repr(u8)]
/// a 1 bit signal that selects the first ALU operand, PC is used by AUIPC.
pub enum ALUSrcA {
    #[default]
    Register = 0,
    PC = 1,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
/// the width of a data memory access
pub enum MemWidth {
    Byte,
    Half,
    #[default]
    Word,
}

impl MemWidth {
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[repr(u8)]
/// a 2 bit signal that selects the value the write back stage commits.
pub enum WriteSource {
    /// the ALU result
    #[default]
    ALUResult = 0b00,
    /// the data read by a load
    Memory = 0b01,
    /// the link address, PC + 4, written by the jump-and-link instructions
    PCPlus4 = 0b10,
    /// the immediate itself, used by LUI
    Immediate = 0b11,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[repr(u8)]
/// a 2 bit signal that specifies where the next PC should come from once this instruction executes.
pub enum BranchType {
    #[default]
    /// not a control transfer, the next PC value comes from PC + 4
    None = 0b00,
    /// a conditional branch, the next PC is the branch target if the comparator says so
    Conditional = 0b01,
    /// JAL, the next PC is always the branch target
    Jump = 0b10,
    /// JALR, the next PC is always the indirect target
    Indirect = 0b11,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
/// the comparison a conditional branch performs
pub enum BranchCondition {
    #[default]
    Eq,
    Ne,
    Lt,
    Ge,
    Ltu,
    Geu,
}

/// The main control unit.
///
/// Maps an instruction's opcode and funct fields to its control signals. Anything that is not a
/// well formed RV32I instruction (unknown opcodes, reserved funct combinations, FENCE) gets the
/// inert `ControlSignals::default()` and flows through the pipeline as a no-op.
#[must_use]
pub fn control_unit(instruction: &Instruction) -> ControlSignals {
    let inert = ControlSignals::default();
    let Some(opcode) = instruction.opcode() else {
        trace!("unknown instruction {instruction:?}, decoding as a no-op");
        return inert;
    };
    let funct3 = instruction.funct3().map(u8::from);

    let mut signals = match u8::from(opcode) {
        opcodes::OP => ControlSignals {
            reg_write: true,
            alu_src: ALUSrc::Register,
            alu_op: ALUOp::Register,
            ..inert
        },
        opcodes::OP_IMM => ControlSignals {
            reg_write: true,
            alu_src: ALUSrc::Immediate,
            alu_op: ALUOp::Immediate,
            ..inert
        },
        opcodes::LOAD => {
            let (mem_width, mem_signed) = match funct3 {
                Some(0b000) => (MemWidth::Byte, true),
                Some(0b001) => (MemWidth::Half, true),
                Some(0b010) => (MemWidth::Word, true),
                Some(0b100) => (MemWidth::Byte, false),
                Some(0b101) => (MemWidth::Half, false),
                _ => return inert,
            };
            ControlSignals {
                reg_write: true,
                alu_src: ALUSrc::Immediate,
                mem_read: true,
                mem_width,
                mem_signed,
                write_source: WriteSource::Memory,
                ..inert
            }
        }
        opcodes::STORE => {
            let mem_width = match funct3 {
                Some(0b000) => MemWidth::Byte,
                Some(0b001) => MemWidth::Half,
                Some(0b010) => MemWidth::Word,
                _ => return inert,
            };
            ControlSignals {
                alu_src: ALUSrc::Immediate,
                mem_write: true,
                mem_width,
                ..inert
            }
        }
        opcodes::BRANCH => {
            let branch_condition = match funct3 {
                Some(0b000) => BranchCondition::Eq,
                Some(0b001) => BranchCondition::Ne,
                Some(0b100) => BranchCondition::Lt,
                Some(0b101) => BranchCondition::Ge,
                Some(0b110) => BranchCondition::Ltu,
                Some(0b111) => BranchCondition::Geu,
                _ => return inert,
            };
            ControlSignals {
                alu_src: ALUSrc::Register,
                alu_op: ALUOp::Branch,
                branch_type: BranchType::Conditional,
                branch_condition,
                ..inert
            }
        }
        opcodes::LUI => ControlSignals {
            reg_write: true,
            alu_src: ALUSrc::Immediate,
            write_source: WriteSource::Immediate,
            ..inert
        },
        opcodes::AUIPC => ControlSignals {
            reg_write: true,
            alu_src_a: ALUSrcA::PC,
            alu_src: ALUSrc::Immediate,
            ..inert
        },
        opcodes::JAL => ControlSignals {
            reg_write: true,
            alu_src_a: ALUSrcA::PC,
            alu_src: ALUSrc::Immediate,
            write_source: WriteSource::PCPlus4,
            branch_type: BranchType::Jump,
            ..inert
        },
        opcodes::JALR if funct3 == Some(0b000) => ControlSignals {
            reg_write: true,
            alu_src: ALUSrc::Immediate,
            write_source: WriteSource::PCPlus4,
            branch_type: BranchType::Indirect,
            ..inert
        },
        opcodes::SYSTEM => match instruction {
            Instruction::IType {
                imm: imm @ (0 | 1),
                rs1,
                rd,
                ..
            } if funct3 == Some(0)
                && *rs1 == RegisterMapping::Zero
                && *rd == RegisterMapping::Zero =>
            {
                trace!("{} decoded", if *imm == 0 { "ecall" } else { "ebreak" });
                ControlSignals { halt: true, ..inert }
            }
            _ => return inert,
        },
        _ => return inert,
    };

    // formats without funct fields only ever add or subtract, which ignore them
    let funct3 = instruction.funct3().unwrap_or(u3::new(0));
    let funct7 = instruction.funct7().unwrap_or(u7::new(0));
    match alu_control_unit(signals.alu_op, funct3, funct7) {
        Ok(alu_control) => signals.alu_control = alu_control,
        Err(e) => {
            trace!("{e}, decoding as a no-op");
            return inert;
        }
    }
    signals
}
