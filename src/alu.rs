use anyhow::{bail, Result};
use ux::{u3, u7};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[repr(u8)]
/// a 2 bit signal that tells the ALU Control Unit what type of instruction is being executed
pub enum ALUOp {
    /// The ALU should perform an ADD operation, this is the case for memory load and store instructions,
    /// and for the address/PC arithmetic of AUIPC and the jumps.
    #[default]
    LoadStore = 0b00,
    /// The ALU should perform a SUB operation, this is the case for branch instructions.
    Branch = 0b01,
    /// The ALU should perform an operation specified by the funct7 and funct3 fields of an R-type instruction.
    Register = 0b10,
    /// The ALU should perform an operation specified by the funct3 (and for shifts, funct7) fields of an I-type instruction.
    Immediate = 0b11,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[repr(u8)]
/// a 4 bit signal that tells the ALU what operation to perform.
pub enum ALUControl {
    AND = 0b0000,
    OR = 0b0001,
    #[default]
    ADD = 0b0010,
    SLL = 0b0011,
    SLT = 0b0100,
    SLTU = 0b0101,
    SUB = 0b0110,
    XOR = 0b0111,
    SRL = 0b1000,
    SRA = 0b1010,
}

/// This function mimics the ALU Control Unit in a risc-v processor, it takes in the ALU operation signal, the funct3 field of the instruction and the funct7 field of the instruction and returns the ALU control signal.
///
/// The ALU operation signal is a 2 bit signal that tells the ALU Control Unit what type of instruction is being executed.
///
/// The funct3 and funct7 fields are used in combination with alu_op to determine the exact operation to be performed by the ALU.
///
/// This function is an implementation of the following Verilog module:
///
/// ```verilog,ignore
/// module ALUControl(
///     input [1:0] Aluop,
///     input [6:0] funct7, [2:0] funct3,
///     output reg [3:0] Control
/// );
///     always @(*)
///     begin
///         case (Aluop)
///             2'b00 : Control <= 4'b0010;
///             2'b01 : Control <= 4'b0110;
///             2'b10 : case({funct7,funct3})
///                 10'b0000000000 : Control <= 4'b0010; // add
///                 10'b0100000000 : Control <= 4'b0110; // sub
///                 10'b0000000111 : Control <= 4'b0000; // and
///                 10'b0000000110 : Control <= 4'b0001; // or
///                 10'b0000000001 : Control <= 4'b0011; // sll
///                 10'b0000000010 : Control <= 4'b0100; // slt
///                 10'b0000000011 : Control <= 4'b0101; // sltu
///                 10'b0000000100 : Control <= 4'b0111; // xor
///                 10'b0000000101 : Control <= 4'b1000; // srl
///                 10'b0100000101 : Control <= 4'b1010; // sra
///                 default : Control <= 4'bxxxx;
///             endcase
///             2'b11 : casez({funct7,funct3})
///                 10'b???????000 : Control <= 4'b0010; // addi
///                 10'b???????010 : Control <= 4'b0100; // slti
///                 10'b???????011 : Control <= 4'b0101; // sltiu
///                 10'b???????100 : Control <= 4'b0111; // xori
///                 10'b???????110 : Control <= 4'b0001; // ori
///                 10'b???????111 : Control <= 4'b0000; // andi
///                 10'b0000000001 : Control <= 4'b0011; // slli
///                 10'b0000000101 : Control <= 4'b1000; // srli
///                 10'b0100000101 : Control <= 4'b1010; // srai
///                 default : Control <= 4'bxxxx;
///             endcase
///         endcase
///     end
/// endmodule
/// ```
///
/// The `xxxx` cases are reported as errors, the control unit turns them into a no-op.
pub fn alu_control_unit(alu_op: ALUOp, funct3: u3, funct7: u7) -> Result<ALUControl> {
    Ok(match alu_op {
        ALUOp::LoadStore => ALUControl::ADD,
        ALUOp::Branch => ALUControl::SUB,
        ALUOp::Register => match (u8::from(funct7), u8::from(funct3)) {
            (0b0000000, 0b000) => ALUControl::ADD,
            (0b0100000, 0b000) => ALUControl::SUB,
            (0b0000000, 0b111) => ALUControl::AND,
            (0b0000000, 0b110) => ALUControl::OR,
            (0b0000000, 0b001) => ALUControl::SLL,
            (0b0000000, 0b010) => ALUControl::SLT,
            (0b0000000, 0b011) => ALUControl::SLTU,
            (0b0000000, 0b100) => ALUControl::XOR,
            (0b0000000, 0b101) => ALUControl::SRL,
            (0b0100000, 0b101) => ALUControl::SRA,
            (funct7, funct3) => bail!(
                "Invalid funct3 and funct7 combination: {funct3:#05b} {funct7:#09b}"
            ),
        },
        ALUOp::Immediate => match (u8::from(funct7), u8::from(funct3)) {
            (_, 0b000) => ALUControl::ADD,
            (_, 0b010) => ALUControl::SLT,
            (_, 0b011) => ALUControl::SLTU,
            (_, 0b100) => ALUControl::XOR,
            (_, 0b110) => ALUControl::OR,
            (_, 0b111) => ALUControl::AND,
            (0b0000000, 0b001) => ALUControl::SLL,
            (0b0000000, 0b101) => ALUControl::SRL,
            (0b0100000, 0b101) => ALUControl::SRA,
            (funct7, funct3) => bail!(
                "Invalid funct3 and funct7 combination: {funct3:#05b} {funct7:#09b}"
            ),
        },
    })
}

/// The ALU: a pure function of the operation and both operands.
///
/// Shifts only use the low 5 bits of `b`, comparisons produce 0 or 1.
#[must_use]
pub fn alu(control: ALUControl, a: u32, b: u32) -> u32 {
    let shamt = b & 0x1f;
    match control {
        ALUControl::ADD => a.wrapping_add(b),
        ALUControl::SUB => a.wrapping_sub(b),
        ALUControl::SLL => a << shamt,
        ALUControl::SLT => u32::from((a as i32) < (b as i32)),
        ALUControl::SLTU => u32::from(a < b),
        ALUControl::XOR => a ^ b,
        ALUControl::SRL => a >> shamt,
        ALUControl::SRA => ((a as i32) >> shamt) as u32,
        ALUControl::OR => a | b,
        ALUControl::AND => a & b,
    }
}
