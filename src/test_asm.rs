//! Encoders for building instruction words in tests.
//!
//! Registers are plain register numbers, immediates are the signed byte offsets or values as
//! they would appear in assembly.

use crate::instruction::opcodes;

fn r_type(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32, opcode: u8) -> u32 {
    funct7 << 25 | rs2 << 20 | rs1 << 15 | funct3 << 12 | rd << 7 | u32::from(opcode)
}

fn i_type(imm: i32, rs1: u32, funct3: u32, rd: u32, opcode: u8) -> u32 {
    ((imm as u32) & 0xfff) << 20 | rs1 << 15 | funct3 << 12 | rd << 7 | u32::from(opcode)
}

fn s_type(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    ((imm >> 5) & 0x7f) << 25
        | rs2 << 20
        | rs1 << 15
        | funct3 << 12
        | (imm & 0x1f) << 7
        | u32::from(opcodes::STORE)
}

fn b_type(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    ((imm >> 12) & 0x1) << 31
        | ((imm >> 5) & 0x3f) << 25
        | rs2 << 20
        | rs1 << 15
        | funct3 << 12
        | ((imm >> 1) & 0xf) << 8
        | ((imm >> 11) & 0x1) << 7
        | u32::from(opcodes::BRANCH)
}

fn u_type(imm20: u32, rd: u32, opcode: u8) -> u32 {
    (imm20 & 0xfffff) << 12 | rd << 7 | u32::from(opcode)
}

pub fn add(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0, rs2, rs1, 0b000, rd, opcodes::OP)
}

pub fn sub(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0b0100000, rs2, rs1, 0b000, rd, opcodes::OP)
}

pub fn sll(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0, rs2, rs1, 0b001, rd, opcodes::OP)
}

pub fn slt(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0, rs2, rs1, 0b010, rd, opcodes::OP)
}

pub fn sltu(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0, rs2, rs1, 0b011, rd, opcodes::OP)
}

pub fn xor(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0, rs2, rs1, 0b100, rd, opcodes::OP)
}

pub fn srl(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0, rs2, rs1, 0b101, rd, opcodes::OP)
}

pub fn sra(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0b0100000, rs2, rs1, 0b101, rd, opcodes::OP)
}

pub fn or(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0, rs2, rs1, 0b110, rd, opcodes::OP)
}

pub fn and(rd: u32, rs1: u32, rs2: u32) -> u32 {
    r_type(0, rs2, rs1, 0b111, rd, opcodes::OP)
}

pub fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b000, rd, opcodes::OP_IMM)
}

pub fn slti(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b010, rd, opcodes::OP_IMM)
}

pub fn sltiu(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b011, rd, opcodes::OP_IMM)
}

pub fn xori(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b100, rd, opcodes::OP_IMM)
}

pub fn ori(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b110, rd, opcodes::OP_IMM)
}

pub fn andi(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b111, rd, opcodes::OP_IMM)
}

pub fn slli(rd: u32, rs1: u32, shamt: u32) -> u32 {
    i_type(shamt as i32, rs1, 0b001, rd, opcodes::OP_IMM)
}

pub fn srli(rd: u32, rs1: u32, shamt: u32) -> u32 {
    i_type(shamt as i32, rs1, 0b101, rd, opcodes::OP_IMM)
}

pub fn srai(rd: u32, rs1: u32, shamt: u32) -> u32 {
    i_type((0b0100000 << 5 | shamt) as i32, rs1, 0b101, rd, opcodes::OP_IMM)
}

pub fn lb(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b000, rd, opcodes::LOAD)
}

pub fn lh(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b001, rd, opcodes::LOAD)
}

pub fn lw(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b010, rd, opcodes::LOAD)
}

pub fn lbu(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b100, rd, opcodes::LOAD)
}

pub fn lhu(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b101, rd, opcodes::LOAD)
}

/// `sb rs2, imm(rs1)`
pub fn sb(rs2: u32, rs1: u32, imm: i32) -> u32 {
    s_type(imm, rs2, rs1, 0b000)
}

/// `sh rs2, imm(rs1)`
pub fn sh(rs2: u32, rs1: u32, imm: i32) -> u32 {
    s_type(imm, rs2, rs1, 0b001)
}

/// `sw rs2, imm(rs1)`
pub fn sw(rs2: u32, rs1: u32, imm: i32) -> u32 {
    s_type(imm, rs2, rs1, 0b010)
}

pub fn beq(rs1: u32, rs2: u32, imm: i32) -> u32 {
    b_type(imm, rs2, rs1, 0b000)
}

pub fn bne(rs1: u32, rs2: u32, imm: i32) -> u32 {
    b_type(imm, rs2, rs1, 0b001)
}

pub fn blt(rs1: u32, rs2: u32, imm: i32) -> u32 {
    b_type(imm, rs2, rs1, 0b100)
}

pub fn bgeu(rs1: u32, rs2: u32, imm: i32) -> u32 {
    b_type(imm, rs2, rs1, 0b111)
}

pub fn jal(rd: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    ((imm >> 20) & 0x1) << 31
        | ((imm >> 1) & 0x3ff) << 21
        | ((imm >> 11) & 0x1) << 20
        | ((imm >> 12) & 0xff) << 12
        | rd << 7
        | u32::from(opcodes::JAL)
}

pub fn jalr(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0b000, rd, opcodes::JALR)
}

pub fn lui(rd: u32, imm20: u32) -> u32 {
    u_type(imm20, rd, opcodes::LUI)
}

pub fn auipc(rd: u32, imm20: u32) -> u32 {
    u_type(imm20, rd, opcodes::AUIPC)
}
