use crate::{
    hazard_detection::{Forward, HazardSignals},
    registers::REGISTERS_COUNT,
    stages::{EXMEM, IDEX, IFID, MEMWB},
};

/// A read-only copy of the core's state after a clock cycle, for tracing and debugging tools.
///
/// `hazards` and the forwarding selections are the ones computed during the cycle that produced
/// this state. Nothing in the core reads a snapshot back.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Snapshot {
    pub total_clock_cycles: u64,
    pub pc: u32,
    pub if_id: IFID,
    pub id_ex: IDEX,
    pub ex_mem: EXMEM,
    pub mem_wb: MEMWB,
    pub hazards: HazardSignals,
    pub forward_a: Forward,
    pub forward_b: Forward,
    pub registers: [u32; REGISTERS_COUNT as usize],
}
