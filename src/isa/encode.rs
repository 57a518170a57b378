//! Instruction Encoders.
//!
//! Minimal assembler for building programs in tests and demos. Offsets are
//! byte offsets relative to the instruction; registers are raw indices.

use crate::isa::{funct3, funct7, opcodes, sys_ops};

/// Encodes an R-type instruction.
pub fn r_type(opcode: u32, rd: usize, f3: u32, rs1: usize, rs2: usize, f7: u32) -> u32 {
    (f7 << 25) | ((rs2 as u32) << 20) | ((rs1 as u32) << 15) | (f3 << 12) | ((rd as u32) << 7) | opcode
}

/// Encodes an I-type instruction.
pub fn i_type(opcode: u32, rd: usize, f3: u32, rs1: usize, imm: i32) -> u32 {
    (((imm as u32) & 0xFFF) << 20) | ((rs1 as u32) << 15) | (f3 << 12) | ((rd as u32) << 7) | opcode
}

/// Encodes an S-type instruction.
pub fn s_type(opcode: u32, f3: u32, rs1: usize, rs2: usize, imm: i32) -> u32 {
    let imm = imm as u32;
    (((imm >> 5) & 0x7F) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | (f3 << 12)
        | ((imm & 0x1F) << 7)
        | opcode
}

/// Encodes a B-type instruction.
pub fn b_type(f3: u32, rs1: usize, rs2: usize, offset: i32) -> u32 {
    let imm = offset as u32;
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3F) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | (f3 << 12)
        | (((imm >> 1) & 0xF) << 8)
        | (((imm >> 11) & 1) << 7)
        | opcodes::OP_BRANCH
}

/// Encodes a U-type instruction; `imm20` is the upper 20 bits.
pub fn u_type(opcode: u32, rd: usize, imm20: u32) -> u32 {
    ((imm20 & 0xF_FFFF) << 12) | ((rd as u32) << 7) | opcode
}

/// Encodes a J-type instruction.
pub fn j_type(rd: usize, offset: i32) -> u32 {
    let imm = offset as u32;
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3FF) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xFF) << 12)
        | ((rd as u32) << 7)
        | opcodes::OP_JAL
}

/// `addi rd, rs1, imm`
pub fn addi(rd: usize, rs1: usize, imm: i32) -> u32 {
    i_type(opcodes::OP_IMM, rd, funct3::ADD_SUB, rs1, imm)
}

/// `andi rd, rs1, imm`
pub fn andi(rd: usize, rs1: usize, imm: i32) -> u32 {
    i_type(opcodes::OP_IMM, rd, funct3::AND, rs1, imm)
}

/// `slli rd, rs1, shamt`
pub fn slli(rd: usize, rs1: usize, shamt: u32) -> u32 {
    i_type(opcodes::OP_IMM, rd, funct3::SLL, rs1, (shamt & 0x1F) as i32)
}

/// `srai rd, rs1, shamt`
pub fn srai(rd: usize, rs1: usize, shamt: u32) -> u32 {
    i_type(opcodes::OP_IMM, rd, funct3::SRL_SRA, rs1, ((funct7::SUB_SRA << 5) | (shamt & 0x1F)) as i32)
}

/// `add rd, rs1, rs2`
pub fn add(rd: usize, rs1: usize, rs2: usize) -> u32 {
    r_type(opcodes::OP_REG, rd, funct3::ADD_SUB, rs1, rs2, funct7::DEFAULT)
}

/// `sub rd, rs1, rs2`
pub fn sub(rd: usize, rs1: usize, rs2: usize) -> u32 {
    r_type(opcodes::OP_REG, rd, funct3::ADD_SUB, rs1, rs2, funct7::SUB_SRA)
}

/// `xor rd, rs1, rs2`
pub fn xor(rd: usize, rs1: usize, rs2: usize) -> u32 {
    r_type(opcodes::OP_REG, rd, funct3::XOR, rs1, rs2, funct7::DEFAULT)
}

/// `sltu rd, rs1, rs2`
pub fn sltu(rd: usize, rs1: usize, rs2: usize) -> u32 {
    r_type(opcodes::OP_REG, rd, funct3::SLTU, rs1, rs2, funct7::DEFAULT)
}

/// `mul rd, rs1, rs2`
pub fn mul(rd: usize, rs1: usize, rs2: usize) -> u32 {
    r_type(opcodes::OP_REG, rd, funct3::MUL, rs1, rs2, funct7::MULDIV)
}

/// `div rd, rs1, rs2`
pub fn div(rd: usize, rs1: usize, rs2: usize) -> u32 {
    r_type(opcodes::OP_REG, rd, funct3::DIV, rs1, rs2, funct7::MULDIV)
}

/// `remu rd, rs1, rs2`
pub fn remu(rd: usize, rs1: usize, rs2: usize) -> u32 {
    r_type(opcodes::OP_REG, rd, funct3::REMU, rs1, rs2, funct7::MULDIV)
}

/// `lui rd, imm20`
pub fn lui(rd: usize, imm20: u32) -> u32 {
    u_type(opcodes::OP_LUI, rd, imm20)
}

/// `auipc rd, imm20`
pub fn auipc(rd: usize, imm20: u32) -> u32 {
    u_type(opcodes::OP_AUIPC, rd, imm20)
}

/// `lw rd, imm(rs1)`
pub fn lw(rd: usize, rs1: usize, imm: i32) -> u32 {
    i_type(opcodes::OP_LOAD, rd, funct3::LW, rs1, imm)
}

/// `lh rd, imm(rs1)`
pub fn lh(rd: usize, rs1: usize, imm: i32) -> u32 {
    i_type(opcodes::OP_LOAD, rd, funct3::LH, rs1, imm)
}

/// `lb rd, imm(rs1)`
pub fn lb(rd: usize, rs1: usize, imm: i32) -> u32 {
    i_type(opcodes::OP_LOAD, rd, funct3::LB, rs1, imm)
}

/// `lbu rd, imm(rs1)`
pub fn lbu(rd: usize, rs1: usize, imm: i32) -> u32 {
    i_type(opcodes::OP_LOAD, rd, funct3::LBU, rs1, imm)
}

/// `sw rs2, imm(rs1)`
pub fn sw(rs1: usize, rs2: usize, imm: i32) -> u32 {
    s_type(opcodes::OP_STORE, funct3::SW, rs1, rs2, imm)
}

/// `sh rs2, imm(rs1)`
pub fn sh(rs1: usize, rs2: usize, imm: i32) -> u32 {
    s_type(opcodes::OP_STORE, funct3::SH, rs1, rs2, imm)
}

/// `sb rs2, imm(rs1)`
pub fn sb(rs1: usize, rs2: usize, imm: i32) -> u32 {
    s_type(opcodes::OP_STORE, funct3::SB, rs1, rs2, imm)
}

/// `beq rs1, rs2, offset`
pub fn beq(rs1: usize, rs2: usize, offset: i32) -> u32 {
    b_type(funct3::BEQ, rs1, rs2, offset)
}

/// `bne rs1, rs2, offset`
pub fn bne(rs1: usize, rs2: usize, offset: i32) -> u32 {
    b_type(funct3::BNE, rs1, rs2, offset)
}

/// `blt rs1, rs2, offset`
pub fn blt(rs1: usize, rs2: usize, offset: i32) -> u32 {
    b_type(funct3::BLT, rs1, rs2, offset)
}

/// `bgeu rs1, rs2, offset`
pub fn bgeu(rs1: usize, rs2: usize, offset: i32) -> u32 {
    b_type(funct3::BGEU, rs1, rs2, offset)
}

/// `jal rd, offset`
pub fn jal(rd: usize, offset: i32) -> u32 {
    j_type(rd, offset)
}

/// `jalr rd, imm(rs1)`
pub fn jalr(rd: usize, rs1: usize, imm: i32) -> u32 {
    i_type(opcodes::OP_JALR, rd, 0, rs1, imm)
}

/// `csrrw rd, csr, rs1`
pub fn csrrw(rd: usize, csr: u32, rs1: usize) -> u32 {
    i_type(opcodes::OP_SYSTEM, rd, funct3::CSRRW, rs1, csr as i32)
}

/// `csrrs rd, csr, rs1`
pub fn csrrs(rd: usize, csr: u32, rs1: usize) -> u32 {
    i_type(opcodes::OP_SYSTEM, rd, funct3::CSRRS, rs1, csr as i32)
}

/// `csrrwi rd, csr, uimm`
pub fn csrrwi(rd: usize, csr: u32, uimm: usize) -> u32 {
    i_type(opcodes::OP_SYSTEM, rd, funct3::CSRRWI, uimm & 0x1F, csr as i32)
}

/// `fence.i`
pub fn fence_i() -> u32 {
    i_type(opcodes::OP_MISC_MEM, 0, funct3::FENCE_I, 0, 0)
}

/// `ecall`
pub fn ecall() -> u32 {
    sys_ops::ECALL
}

/// `ebreak`
pub fn ebreak() -> u32 {
    sys_ops::EBREAK
}

/// `mret`
pub fn mret() -> u32 {
    sys_ops::MRET
}

/// `nop`
pub fn nop() -> u32 {
    sys_ops::NOP
}

/// Loads a full 32-bit constant into `rd` (`lui` + `addi`).
pub fn li(rd: usize, value: u32) -> [u32; 2] {
    let lo = ((value & 0xFFF) as i32) << 20 >> 20;
    let hi = value.wrapping_sub(lo as u32) >> 12;
    [lui(rd, hi), addi(rd, rd, lo)]
}

/// Serializes instruction words little-endian.
pub fn to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}
