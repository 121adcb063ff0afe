use anyhow::Result;
use log::{debug, info, trace};

use crate::{
    alu::alu,
    branch::branch_comparator,
    config::Config,
    hazard_detection::{forwarding_unit, Forward, HazardDetectionUnit, HazardSignals},
    instruction::Instruction,
    memory::{DataMemory, InstructionMemory},
    registers::{RegisterFile, RegisterMapping, RegisterWrite, REGISTERS_COUNT},
    signals::{control_unit, ALUSrc, ALUSrcA, BranchType, ControlSignals, MemWidth},
    snapshot::Snapshot,
    stages::{PipelineRegister, EXMEM, IDEX, IFID, MEMWB},
};

/// a string that holds a report of what happened in the CPU during a clock cycle.
pub type Report = String;

/// The combinational outputs of the execute stage.
///
/// Besides the next EX/MEM contents, these feed back to fetch (next PC selection) and the hazard
/// unit (flush) within the same cycle.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ExecuteOutput {
    pub ex_mem: EXMEM,
    pub branch_type: BranchType,
    pub branch_taken: bool,
    /// the instruction's own PC + immediate, used by conditional branches and JAL
    pub branch_target: u32,
    /// (rs1 + immediate) with bit 0 cleared, used by JALR
    pub jump_target: u32,
}

/// A store issued by the memory stage, it lands in data memory at the clock edge.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MemoryWrite {
    pub address: u32,
    pub width: MemWidth,
    pub value: u32,
}

impl MemoryWrite {
    /// the part of `value` that actually reaches memory
    pub fn stored_value(&self) -> u32 {
        match self.width {
            MemWidth::Byte => self.value & 0xff,
            MemWidth::Half => self.value & 0xffff,
            MemWidth::Word => self.value,
        }
    }
}

/// Why [`CPU::run`] stopped ticking.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExitReason {
    /// an environment call or breakpoint retired
    Halted,
    /// every instruction of the program has left the pipeline
    Drained,
    /// the cycle limit was reached first
    CycleLimit,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CPU {
    /// the address of the instruction fetched in the next cycle.
    pc: u32,
    total_clock_cycles: u64,
    /// an integer array that has 32 entries.
    /// This register file array will be initialized to have all zeros unless otherwise specified.
    /// This register file will be updated by the write back stage only.
    /// This register file can be indexed by with `RegisterMapping` enum variants for ergonomics.
    rf: RegisterFile,
    /// byte addressable data memory, beginning from address `0x0`.
    /// Only the memory stage accesses it, at most once per cycle.
    d_mem: DataMemory,
    /// an array that holds the instructions of the program.
    /// Each instruction is a 32-bit integer.
    /// The program counter (PC) will be used to index this array to get the current instruction.
    i_mem: InstructionMemory,
    if_id: IFID,
    id_ex: IDEX,
    ex_mem: EXMEM,
    mem_wb: MEMWB,
    /// the hazard signals computed during the last cycle, kept for snapshots only
    hazards: HazardSignals,
    /// the forwarding selections computed during the last cycle, kept for snapshots only
    forwarding: (Forward, Forward),
    /// set once an environment call or breakpoint has been retired by the write back stage
    halted: bool,
}

impl CPU {
    /// Initialize the CPU state
    pub fn new(rom: Vec<u32>) -> Self {
        Self {
            pc: 0,
            total_clock_cycles: 0,
            rf: RegisterFile::new(),
            d_mem: DataMemory::default(),
            i_mem: InstructionMemory::new(rom),
            if_id: IFID::bubble(),
            id_ex: IDEX::bubble(),
            ex_mem: EXMEM::bubble(),
            mem_wb: MEMWB::bubble(),
            hazards: HazardSignals::default(),
            forwarding: (Forward::None, Forward::None),
            halted: false,
        }
    }

    /// Initialize the CPU state, with the memory size and initial register and memory contents from `config`
    pub fn with_config(rom: Vec<u32>, config: &Config) -> Result<Self> {
        let mut cpu = Self::new(rom);
        cpu.d_mem = DataMemory::new(config.memory.data_memory_size);
        cpu.initialize_dmem(&config.memory.words());
        cpu.initialize_rf(&config.register_mappings()?);
        Ok(cpu)
    }

    pub fn initialize_rf(&mut self, mappings: &[(RegisterMapping, u32)]) {
        self.rf.initialize(mappings);
    }

    /// Initialize the data memory with `(address, word)` pairs
    pub fn initialize_dmem(&mut self, words: &[(u32, u32)]) {
        self.d_mem.initialize(words);
    }

    pub fn get_total_clock_cycles(&self) -> u64 {
        self.total_clock_cycles
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn register(&self, reg: RegisterMapping) -> u32 {
        self.rf.read(reg)
    }

    pub fn registers(&self) -> [u32; REGISTERS_COUNT as usize] {
        self.rf.registers()
    }

    pub fn data_memory(&self) -> &DataMemory {
        &self.d_mem
    }

    /// whether an environment call or breakpoint has retired
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// whether the program has run off its end and every instruction of it has left the pipeline
    pub fn is_done(&self) -> bool {
        !self.i_mem.contains(self.pc)
            && !self.in_program(&self.if_id)
            && !self.in_program(&self.id_ex)
            && !self.in_program(&self.ex_mem)
            && !self.in_program(&self.mem_wb)
    }

    fn in_program<R: PipelineRegister>(&self, reg: &R) -> bool {
        reg.is_valid() && self.i_mem.contains(reg.pc())
    }

    /// A read-only copy of the current state, see [`Snapshot`]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            total_clock_cycles: self.total_clock_cycles,
            pc: self.pc,
            if_id: self.if_id,
            id_ex: self.id_ex,
            ex_mem: self.ex_mem,
            mem_wb: self.mem_wb,
            hazards: self.hazards,
            forward_a: self.forwarding.0,
            forward_b: self.forwarding.1,
            registers: self.rf.registers(),
        }
    }

    /// Main loop of the CPU simulator, ticks until the program halts, drains, or `max_cycles` have elapsed
    pub fn run(&mut self, max_cycles: u64) -> ExitReason {
        self.run_with_reports(max_cycles, |report| trace!("{report}"))
    }

    /// [`CPU::run`], handing every cycle's report to `on_report`
    pub fn run_with_reports(
        &mut self,
        max_cycles: u64,
        mut on_report: impl FnMut(Report),
    ) -> ExitReason {
        loop {
            if self.halted {
                return ExitReason::Halted;
            }
            if self.is_done() {
                return ExitReason::Drained;
            }
            if self.total_clock_cycles >= max_cycles {
                return ExitReason::CycleLimit;
            }
            on_report(self.run_step());
        }
    }

    /// Body of the main loop of the CPU simulator, one clock cycle.
    ///
    /// First every stage computes its outputs from the pipeline registers as they were at the
    /// end of the previous cycle, then all state is updated at once as on a clock edge.
    pub fn run_step(&mut self) -> Report {
        self.total_clock_cycles += 1;
        let mut report = format!("total_clock_cycles {} :\n", self.total_clock_cycles);
        debug!("cycle {}: pc {:#x}", self.total_clock_cycles, self.pc);

        // combinational logic, stages in reverse so that feedback paths are already computed
        let write_back = self.write_back();
        let retiring = self.mem_wb;
        let (mem_wb, store) = self.mem();
        let (forward_a, forward_b) = forwarding_unit(&self.ex_mem, &self.mem_wb, &self.id_ex);
        let execute = self.execute(forward_a, forward_b, write_back.data);
        let decoded = self.decode(&write_back);
        let hazards =
            HazardDetectionUnit::prime(&self.if_id, &self.id_ex, execute.branch_taken).signals();
        let (fetched, next_pc) = self.fetch(&execute);

        // clock edge
        if let Some(store) = store {
            if self.d_mem.write(store.address, store.width, store.value) {
                report.push_str(&format!(
                    "memory {:#x} is modified to {:#x}\n",
                    store.address,
                    store.stored_value()
                ));
            }
        }
        if let Some((reg, value)) = self.rf.write(write_back) {
            report.push_str(&format!("{reg} is modified to {value:#x}\n"));
        }

        let pc = if hazards.stall_fetch { self.pc } else { next_pc };
        if pc != self.pc {
            report.push_str(&format!("pc is modified to {pc:#x}\n"));
        }
        self.pc = pc;
        self.if_id = hazards.if_id_update().apply(self.if_id, fetched);
        self.id_ex = hazards.id_ex_update().apply(self.id_ex, decoded);
        self.ex_mem = execute.ex_mem;
        self.mem_wb = mem_wb;

        if hazards.is_stalled() {
            report.push_str("pipeline stalled\n");
        }
        if hazards.is_flushed() {
            report.push_str("pipeline flushed\n");
        }
        self.hazards = hazards;
        self.forwarding = (forward_a, forward_b);

        if retiring.valid && retiring.control_signals.halt {
            info!(
                "{:#010x} retired at pc {:#x}, halting after {} cycles",
                retiring.instruction_code, retiring.pc, self.total_clock_cycles
            );
            self.halted = true;
        }

        report
    }

    /// the Fetch stage of the CPU.
    ///
    /// Reads the instruction at PC and selects the next PC, using the decision the execute stage
    /// made this cycle. If that decision redirects the PC, the instruction read here is on the
    /// wrong path and is marked invalid.
    fn fetch(&self, execute: &ExecuteOutput) -> (IFID, u32) {
        let instruction_code = self.i_mem.get_instruction(self.pc);
        let pc_plus_4 = self.pc.wrapping_add(4);

        let next_pc = match execute.branch_type {
            BranchType::Indirect => execute.jump_target,
            BranchType::Jump => execute.branch_target,
            BranchType::Conditional if execute.branch_taken => execute.branch_target,
            BranchType::Conditional | BranchType::None => pc_plus_4,
        };

        trace!("IF : pc {:#x} -> {instruction_code:#010x}", self.pc);
        (
            IFID {
                valid: !execute.branch_taken,
                pc: self.pc,
                next_pc: pc_plus_4,
                instruction_code,
            },
            next_pc,
        )
    }

    /// the Decode stage of the CPU.
    ///
    /// Reads the source registers with the write back stage's write bypassed in, extracts the
    /// immediate and generates the control signals.
    fn decode(&self, write_back: &RegisterWrite) -> IDEX {
        let ifid = &self.if_id;
        let instruction = Instruction::from(ifid.instruction_code);
        let control_signals = if ifid.valid {
            control_unit(&instruction)
        } else {
            ControlSignals::default()
        };

        let read = |reg: Option<RegisterMapping>| {
            reg.map_or(0, |reg| self.rf.read_with_bypass(reg, write_back))
        };
        let (rs1, rs2) = (instruction.rs1(), instruction.rs2());

        trace!("ID : pc {:#x} {instruction:?}", ifid.pc);
        IDEX {
            valid: ifid.valid,
            pc: ifid.pc,
            next_pc: ifid.next_pc,
            instruction_code: ifid.instruction_code,
            rs1,
            rs2,
            rd: instruction.rd().unwrap_or(RegisterMapping::Zero),
            read_data_1: read(rs1),
            read_data_2: read(rs2),
            sign_extended_immediate: instruction.imm(),
            control_signals,
        }
    }

    /// the Execute stage of the CPU.
    ///
    /// `write_back_data` is the value the write back stage is committing this cycle, forwarded
    /// when MEM/WB holds the producer of an operand.
    fn execute(
        &self,
        forward_a: Forward,
        forward_b: Forward,
        write_back_data: u32,
    ) -> ExecuteOutput {
        let idex = &self.id_ex;
        let control_signals = idex.control_signals;
        let imm = idex.sign_extended_immediate;

        let resolve = |forward: Forward, read_data: u32| match forward {
            Forward::None => read_data,
            Forward::EXMEM => self.ex_mem.forwarded_value(),
            Forward::MEMWB => write_back_data,
        };
        let rs1_value = resolve(forward_a, idex.read_data_1);
        let rs2_value = resolve(forward_b, idex.read_data_2);

        let operand_a = match control_signals.alu_src_a {
            ALUSrcA::Register => rs1_value,
            ALUSrcA::PC => idex.pc,
        };
        let operand_b = match control_signals.alu_src {
            ALUSrc::Register => rs2_value,
            ALUSrc::Immediate => imm,
        };
        let alu_result = alu(control_signals.alu_control, operand_a, operand_b);

        let branch_target = idex.pc.wrapping_add(imm);
        let jump_target = rs1_value.wrapping_add(imm) & !1;
        let branch_taken = idex.valid
            && match control_signals.branch_type {
                BranchType::None => false,
                BranchType::Conditional => branch_comparator(
                    control_signals.branch_condition,
                    rs1_value,
                    rs2_value,
                ),
                BranchType::Jump | BranchType::Indirect => true,
            };

        if branch_taken {
            debug!(
                "EX : {:?} at pc {:#x} taken, target {:#x}",
                control_signals.branch_type,
                idex.pc,
                match control_signals.branch_type {
                    BranchType::Indirect => jump_target,
                    _ => branch_target,
                }
            );
        }
        trace!("EX : pc {:#x} alu result {alu_result:#x}", idex.pc);

        ExecuteOutput {
            // the branch or jump itself always continues down the pipeline
            ex_mem: EXMEM {
                valid: idex.valid,
                pc: idex.pc,
                next_pc: idex.next_pc,
                instruction_code: idex.instruction_code,
                rd: idex.rd,
                alu_result,
                read_data_2: rs2_value,
                sign_extended_immediate: imm,
                control_signals,
            },
            branch_type: control_signals.branch_type,
            branch_taken,
            branch_target,
            jump_target,
        }
    }

    /// the Memory stage of the CPU.
    ///
    /// Loads are read from the memory as it was at the start of the cycle, a store is returned
    /// to be applied at the clock edge. Bubbles never access memory.
    fn mem(&self) -> (MEMWB, Option<MemoryWrite>) {
        let exmem = &self.ex_mem;
        let control_signals = exmem.control_signals;

        let mem_data = if exmem.valid && control_signals.mem_read {
            let data = self.d_mem.read(
                exmem.alu_result,
                control_signals.mem_width,
                control_signals.mem_signed,
            );
            trace!("MEM: pc {:#x} load {data:#x} from {:#x}", exmem.pc, exmem.alu_result);
            data
        } else {
            0
        };

        let store = (exmem.valid && control_signals.mem_write).then(|| {
            trace!(
                "MEM: pc {:#x} store {:#x} to {:#x}",
                exmem.pc,
                exmem.read_data_2,
                exmem.alu_result
            );
            MemoryWrite {
                address: exmem.alu_result,
                width: control_signals.mem_width,
                value: exmem.read_data_2,
            }
        });

        (
            MEMWB {
                valid: exmem.valid,
                pc: exmem.pc,
                next_pc: exmem.next_pc,
                instruction_code: exmem.instruction_code,
                rd: exmem.rd,
                alu_result: exmem.alu_result,
                mem_data,
                sign_extended_immediate: exmem.sign_extended_immediate,
                control_signals,
            },
            store,
        )
    }

    /// the Write Back stage of the CPU.
    ///
    /// Drives the register file's write port, which is only enabled for valid instructions.
    fn write_back(&self) -> RegisterWrite {
        let memwb = &self.mem_wb;
        RegisterWrite {
            address: memwb.rd,
            data: memwb.write_data(),
            enable: memwb.valid && memwb.control_signals.reg_write,
        }
    }
}
