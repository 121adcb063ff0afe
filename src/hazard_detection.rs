use log::debug;

use crate::{
    instruction::Instruction,
    registers::RegisterMapping,
    stages::{Update, EXMEM, IDEX, IFID, MEMWB},
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
/// a 2 bit signal that tells the execute stage where to take a source operand from.
pub enum Forward {
    /// the value read from the register file during decode
    #[default]
    None = 0b00,
    /// the result of the instruction one ahead, in EX/MEM
    EXMEM = 0b10,
    /// the value being written back by the instruction two ahead, in MEM/WB
    MEMWB = 0b01,
}

/// the forwarding unit determines whether to forward data from the EX/MEM and/or MEM/WB stages to the ID/EX stage.
///
/// EX/MEM is checked first: it holds the younger of the two producers, so its value is the most recent one.
pub fn forwarding_unit(exmem: &EXMEM, memwb: &MEMWB, idex: &IDEX) -> (Forward, Forward) {
    // destination registers of producers that will write back, x0 is never forwarded
    let producer = |valid: bool, reg_write: bool, rd: RegisterMapping| {
        (valid && reg_write && rd != RegisterMapping::Zero).then_some(rd)
    };
    let exmem_dest_reg = producer(exmem.valid, exmem.control_signals.reg_write, exmem.rd);
    let memwb_dest_reg = producer(memwb.valid, memwb.control_signals.reg_write, memwb.rd);

    let select = |source: Option<RegisterMapping>| match source {
        None => Forward::None,
        Some(rs) if exmem_dest_reg == Some(rs) => Forward::EXMEM,
        Some(rs) if memwb_dest_reg == Some(rs) => Forward::MEMWB,
        Some(_) => Forward::None,
    };

    let (forward_a, forward_b) = (select(idex.rs1), select(idex.rs2));
    if forward_a != Forward::None || forward_b != Forward::None {
        debug!(
            "forwarding for pc {:#x}: rs1 {:?} from {forward_a:?}, rs2 {:?} from {forward_b:?}",
            idex.pc, idex.rs1, idex.rs2
        );
    }
    (forward_a, forward_b)
}

/// the stall and flush decisions for one clock cycle.
///
/// each flag names the stage whose input is affected: a stalled stage keeps its input, a flushed
/// stage receives a bubble in place of its upstream stage's output.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct HazardSignals {
    /// the PC keeps its value
    pub stall_fetch: bool,
    /// IF/ID keeps its value
    pub stall_decode: bool,
    /// IF/ID receives a bubble, the instruction fetched this cycle is on the wrong path
    pub flush_decode: bool,
    /// ID/EX receives a bubble, the instruction decoded this cycle must not execute (yet)
    pub flush_execute: bool,
}

impl HazardSignals {
    /// how IF/ID is replaced at the end of the cycle
    pub fn if_id_update(&self) -> Update {
        if self.stall_decode {
            Update::Hold
        } else if self.flush_decode {
            Update::Bubble
        } else {
            Update::Load
        }
    }

    /// how ID/EX is replaced at the end of the cycle, it is never held
    pub fn id_ex_update(&self) -> Update {
        if self.flush_execute {
            Update::Bubble
        } else {
            Update::Load
        }
    }

    pub fn is_stalled(&self) -> bool {
        self.stall_fetch || self.stall_decode
    }

    pub fn is_flushed(&self) -> bool {
        self.flush_decode
    }
}

/// The hazard detection unit determines whether there is a data hazard between the ID and EX stages that requires stalling (e.g. load data hazards),
/// and whether the instructions behind a taken branch or jump must be flushed.
/// (the forwarding unit handles rtype data hazards, and can handle load hazards if a stall was performed)
///
/// # Fields
///
/// * `ifid_rs1` - the source register 1 from the IF/ID stage
/// * `ifid_rs2` - the source register 2 from the IF/ID stage
/// * `idex_rd` - the destination register from the ID/EX stage, if it is a valid instruction
/// * `idex_memread` - a boolean indicating whether the instruction in the ID/EX stage reads from memory
/// * `branch_taken` - whether the execute stage is redirecting the PC this cycle
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct HazardDetectionUnit {
    ifid_rs1: Option<RegisterMapping>,
    ifid_rs2: Option<RegisterMapping>,
    idex_rd: Option<RegisterMapping>,
    idex_memread: bool,
    branch_taken: bool,
}

impl HazardDetectionUnit {
    /// prime the hazard detection unit with the relevant current pipeline state
    pub fn prime(ifid_reg: &IFID, idex_reg: &IDEX, branch_taken: bool) -> Self {
        let decoded_instruction = Instruction::from(ifid_reg.instruction_code);
        let (ifid_rs1, ifid_rs2) = if ifid_reg.valid {
            (decoded_instruction.rs1(), decoded_instruction.rs2())
        } else {
            (None, None)
        };

        let idex_rd =
            (idex_reg.valid && idex_reg.rd != RegisterMapping::Zero).then_some(idex_reg.rd);
        let idex_memread = idex_reg.valid && idex_reg.control_signals.mem_read;

        Self {
            ifid_rs1,
            ifid_rs2,
            idex_rd,
            idex_memread,
            branch_taken,
        }
    }

    /// Detect whether a stall is required to resolve a data hazard
    pub fn detect_stall_conditions(&self) -> bool {
        if !self.idex_memread {
            return false;
        }

        // check for a hazard with rs1
        let rs1_hazard =
            matches!((self.ifid_rs1, self.idex_rd), (Some(rs1), Some(rd)) if rs1 == rd);

        // check for a hazard with rs2
        let rs2_hazard =
            matches!((self.ifid_rs2, self.idex_rd), (Some(rs2), Some(rd)) if rs2 == rd);

        // return whether a stall is required
        rs1_hazard || rs2_hazard
    }

    /// Detect whether the instructions fetched after a branch or jump have to be discarded
    pub fn detect_flush_conditions(&self) -> bool {
        self.branch_taken
    }

    /// the stall and flush signals for this cycle.
    ///
    /// a taken branch/jump in EX cannot also be a load, so the two conditions never coincide;
    /// should they, the flush wins since the stalled instruction is on the wrong path anyway.
    pub fn signals(&self) -> HazardSignals {
        if self.detect_flush_conditions() {
            debug!("control hazard: flushing IF/ID and ID/EX");
            return HazardSignals {
                flush_decode: true,
                flush_execute: true,
                ..Default::default()
            };
        }
        if self.detect_stall_conditions() {
            debug!("load-use hazard on {:?}: stalling one cycle", self.idex_rd);
            return HazardSignals {
                stall_fetch: true,
                stall_decode: true,
                flush_execute: true,
                ..Default::default()
            };
        }
        HazardSignals::default()
    }
}
