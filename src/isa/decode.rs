//! RISC-V Instruction Decoder.
//!
//! Splits a 32-bit encoding into its fields and reconstructs the
//! sign-extended immediate for the format the opcode uses (I, S, B, U, J).

use crate::isa::instruction::{Decoded, InstructionBits};
use crate::isa::opcodes;

/// Sign-extends the low `bits` bits of `value`.
#[inline(always)]
pub fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// I-type immediate: `inst[31:20]`.
#[inline(always)]
pub fn imm_i(inst: u32) -> i32 {
    (inst as i32) >> 20
}

/// S-type immediate: `inst[31:25] | inst[11:7]`.
#[inline(always)]
pub fn imm_s(inst: u32) -> i32 {
    let value = ((inst >> 25) << 5) | ((inst >> 7) & 0x1F);
    sign_extend(value, 12)
}

/// B-type immediate: `imm[12|10:5]` in `inst[31:25]`, `imm[4:1|11]` in `inst[11:7]`.
#[inline(always)]
pub fn imm_b(inst: u32) -> i32 {
    let value = ((inst >> 31) & 1) << 12
        | ((inst >> 7) & 1) << 11
        | ((inst >> 25) & 0x3F) << 5
        | ((inst >> 8) & 0xF) << 1;
    sign_extend(value, 13)
}

/// U-type immediate: `inst[31:12] << 12`.
#[inline(always)]
pub fn imm_u(inst: u32) -> i32 {
    (inst & 0xFFFF_F000) as i32
}

/// J-type immediate: `imm[20|10:1|11|19:12]` in `inst[31:12]`.
#[inline(always)]
pub fn imm_j(inst: u32) -> i32 {
    let value = ((inst >> 31) & 1) << 20
        | ((inst >> 12) & 0xFF) << 12
        | ((inst >> 20) & 1) << 11
        | ((inst >> 21) & 0x3FF) << 1;
    sign_extend(value, 21)
}

/// Decodes a raw instruction into its fields.
///
/// # Arguments
///
/// * `inst` - The 32-bit encoding.
///
/// # Returns
///
/// The decoded fields. Unknown opcodes decode with a zero immediate; the
/// decode stage is responsible for rejecting them.
pub fn decode(inst: u32) -> Decoded {
    let opcode = inst.opcode();
    let imm = match opcode {
        opcodes::OP_IMM | opcodes::OP_LOAD | opcodes::OP_JALR | opcodes::OP_SYSTEM
        | opcodes::OP_MISC_MEM => imm_i(inst),
        opcodes::OP_STORE => imm_s(inst),
        opcodes::OP_BRANCH => imm_b(inst),
        opcodes::OP_LUI | opcodes::OP_AUIPC => imm_u(inst),
        opcodes::OP_JAL => imm_j(inst),
        _ => 0,
    };

    Decoded {
        raw: inst,
        opcode,
        rd: inst.rd(),
        rs1: inst.rs1(),
        rs2: inst.rs2(),
        funct3: inst.funct3(),
        funct7: inst.funct7(),
        imm,
    }
}

/// Source registers an instruction actually reads.
///
/// Used by hazard detection to avoid stalling on fields that merely
/// overlap an immediate.
pub fn source_regs(d: &Decoded) -> (Option<usize>, Option<usize>) {
    match d.opcode {
        opcodes::OP_REG | opcodes::OP_BRANCH | opcodes::OP_STORE => (Some(d.rs1), Some(d.rs2)),
        opcodes::OP_IMM | opcodes::OP_LOAD | opcodes::OP_JALR => (Some(d.rs1), None),
        // CSR register forms read rs1; the immediate forms (funct3 bit 2) do not.
        opcodes::OP_SYSTEM if d.funct3 != 0 && d.funct3 & 0b100 == 0 => (Some(d.rs1), None),
        _ => (None, None),
    }
}
