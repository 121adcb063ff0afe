//! A cycle-accurate model of a 5-stage pipelined RV32I core.
//!
//! Fetch, decode, execute, memory and write back run every clock cycle, separated by the IF/ID,
//! ID/EX, EX/MEM and MEM/WB pipeline registers. Data hazards are resolved by forwarding, plus a
//! one cycle stall for a load followed by a use of its result; branches and jumps are resolved in
//! execute and flush the two instructions fetched behind them.

pub mod alu;
pub mod branch;
pub mod config;
pub mod cpu;
pub mod hazard_detection;
pub mod instruction;
pub mod memory;
pub mod registers;
pub mod signals;
pub mod snapshot;
pub mod stages;
pub mod utils;

#[cfg(test)]
mod test_asm;
