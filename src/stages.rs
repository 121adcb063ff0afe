//! Structs that represent the outputs of the various stages of the pipeline.
//!
//! Each one is latched into the pipeline register of the same name at the end of a clock cycle.
//! An invalid register is a bubble: it carries inert control signals, so the downstream stages
//! run the same code path for it without changing architectural state.

use crate::{
    instruction::NOP,
    registers::RegisterMapping,
    signals::{ControlSignals, WriteSource},
};

/// Common behaviour of the four pipeline registers.
pub trait PipelineRegister: Copy {
    /// a register that holds no instruction
    fn bubble() -> Self;

    /// whether the register holds a real instruction
    fn is_valid(&self) -> bool;

    /// the PC of the instruction held, meaningless for a bubble
    fn pc(&self) -> u32;
}

/// How a pipeline register is replaced at the end of a cycle.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Update {
    /// take the upstream stage's output
    #[default]
    Load,
    /// keep the current contents (stall)
    Hold,
    /// discard the upstream output and take a bubble (flush)
    Bubble,
}

impl Update {
    /// the next value of a pipeline register currently holding `current`, given the upstream stage produced `incoming`
    pub fn apply<R: PipelineRegister>(self, current: R, incoming: R) -> R {
        match self {
            Self::Load => incoming,
            Self::Hold => current,
            Self::Bubble => R::bubble(),
        }
    }
}

/// IF/ID: an instruction word that has been fetched but not decoded.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct IFID {
    pub valid: bool,
    pub pc: u32,
    pub next_pc: u32,
    pub instruction_code: u32,
}

/// ID/EX: a decoded instruction with its register operands read.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct IDEX {
    pub valid: bool,
    pub pc: u32,
    pub next_pc: u32,
    pub instruction_code: u32,
    /// the first source register, `None` if the instruction's format does not read one
    pub rs1: Option<RegisterMapping>,
    /// the second source register, `None` if the instruction's format does not read one
    pub rs2: Option<RegisterMapping>,
    pub rd: RegisterMapping,
    pub read_data_1: u32,
    pub read_data_2: u32,
    pub sign_extended_immediate: u32,
    pub control_signals: ControlSignals,
}

/// EX/MEM: an executed instruction, waiting for its memory access.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct EXMEM {
    pub valid: bool,
    pub pc: u32,
    pub next_pc: u32,
    pub instruction_code: u32,
    pub rd: RegisterMapping,
    /// the ALU result, which is the effective address for loads and stores
    pub alu_result: u32,
    /// rs2 after forwarding, the data a store writes
    pub read_data_2: u32,
    pub sign_extended_immediate: u32,
    pub control_signals: ControlSignals,
}

/// MEM/WB: an instruction that has finished its memory access and is waiting to retire.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MEMWB {
    pub valid: bool,
    pub pc: u32,
    pub next_pc: u32,
    pub instruction_code: u32,
    pub rd: RegisterMapping,
    pub alu_result: u32,
    /// the value loaded from data memory, 0 if the instruction is not a load
    pub mem_data: u32,
    pub sign_extended_immediate: u32,
    pub control_signals: ControlSignals,
}

impl Default for IFID {
    fn default() -> Self {
        Self::bubble()
    }
}

impl Default for IDEX {
    fn default() -> Self {
        Self::bubble()
    }
}

impl Default for EXMEM {
    fn default() -> Self {
        Self::bubble()
    }
}

impl Default for MEMWB {
    fn default() -> Self {
        Self::bubble()
    }
}

impl PipelineRegister for IFID {
    fn bubble() -> Self {
        Self {
            valid: false,
            pc: 0,
            next_pc: 0,
            instruction_code: NOP,
        }
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn pc(&self) -> u32 {
        self.pc
    }
}

impl PipelineRegister for IDEX {
    fn bubble() -> Self {
        Self {
            valid: false,
            pc: 0,
            next_pc: 0,
            instruction_code: NOP,
            rs1: None,
            rs2: None,
            rd: RegisterMapping::Zero,
            read_data_1: 0,
            read_data_2: 0,
            sign_extended_immediate: 0,
            control_signals: ControlSignals::default(),
        }
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn pc(&self) -> u32 {
        self.pc
    }
}

impl PipelineRegister for EXMEM {
    fn bubble() -> Self {
        Self {
            valid: false,
            pc: 0,
            next_pc: 0,
            instruction_code: NOP,
            rd: RegisterMapping::Zero,
            alu_result: 0,
            read_data_2: 0,
            sign_extended_immediate: 0,
            control_signals: ControlSignals::default(),
        }
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn pc(&self) -> u32 {
        self.pc
    }
}

impl PipelineRegister for MEMWB {
    fn bubble() -> Self {
        Self {
            valid: false,
            pc: 0,
            next_pc: 0,
            instruction_code: NOP,
            rd: RegisterMapping::Zero,
            alu_result: 0,
            mem_data: 0,
            sign_extended_immediate: 0,
            control_signals: ControlSignals::default(),
        }
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn pc(&self) -> u32 {
        self.pc
    }
}

impl EXMEM {
    /// The value this instruction will eventually write back, as far as it is known before the
    /// memory stage. This is what the forwarding unit routes to the execute stage; a load's value
    /// is not known yet, but the hazard unit never lets a consumer of it sit right behind it.
    pub fn forwarded_value(&self) -> u32 {
        match self.control_signals.write_source {
            WriteSource::ALUResult | WriteSource::Memory => self.alu_result,
            WriteSource::PCPlus4 => self.next_pc,
            WriteSource::Immediate => self.sign_extended_immediate,
        }
    }
}

impl MEMWB {
    /// the write back mux
    pub fn write_data(&self) -> u32 {
        match self.control_signals.write_source {
            WriteSource::ALUResult => self.alu_result,
            WriteSource::Memory => self.mem_data,
            WriteSource::PCPlus4 => self.next_pc,
            WriteSource::Immediate => self.sign_extended_immediate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bubbles_are_inert() {
        assert!(!IFID::bubble().is_valid());
        assert!(!IDEX::bubble().control_signals.has_effect());
        assert!(!EXMEM::bubble().control_signals.has_effect());
        assert!(!MEMWB::bubble().control_signals.has_effect());
        assert!(!MEMWB::bubble().control_signals.halt);
    }

    #[test]
    fn test_update_rules() {
        let current = IFID {
            valid: true,
            pc: 4,
            next_pc: 8,
            instruction_code: 0x1234_5678,
        };
        let incoming = IFID {
            valid: true,
            pc: 8,
            next_pc: 12,
            instruction_code: 0x8765_4321,
        };

        assert_eq!(Update::Load.apply(current, incoming), incoming);
        assert_eq!(Update::Hold.apply(current, incoming), current);
        assert_eq!(Update::Bubble.apply(current, incoming), IFID::bubble());
    }

    #[test]
    fn test_write_back_mux() {
        let mut mem_wb = MEMWB {
            valid: true,
            pc: 0x10,
            next_pc: 0x14,
            alu_result: 1,
            mem_data: 2,
            sign_extended_immediate: 3,
            ..MEMWB::bubble()
        };
        let sources = [
            (WriteSource::ALUResult, 1),
            (WriteSource::Memory, 2),
            (WriteSource::PCPlus4, 0x14),
            (WriteSource::Immediate, 3),
        ];
        for (write_source, expected) in sources {
            mem_wb.control_signals.write_source = write_source;
            assert_eq!(mem_wb.write_data(), expected);
        }
    }
}
