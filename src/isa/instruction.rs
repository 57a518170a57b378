//! Instruction field extraction.
//!
//! Provides bit extraction for the fixed fields of a 32-bit RISC-V
//! instruction and the `Decoded` record produced by the decoder.

/// Bit mask for the opcode field (bits 0-6).
pub const OPCODE_MASK: u32 = 0x7F;
/// Bit mask for a register index field.
pub const REG_MASK: u32 = 0x1F;
/// Bit mask for the funct3 field (bits 12-14).
pub const FUNCT3_MASK: u32 = 0x7;
/// Bit mask for the funct7 field (bits 25-31).
pub const FUNCT7_MASK: u32 = 0x7F;
/// Bit mask for the CSR address field (bits 20-31).
pub const CSR_MASK: u32 = 0xFFF;

/// Trait for extracting fields from encoded instructions.
pub trait InstructionBits {
    /// Major opcode (bits 0-6).
    fn opcode(&self) -> u32;

    /// Destination register (bits 7-11).
    fn rd(&self) -> usize;

    /// First source register (bits 15-19).
    fn rs1(&self) -> usize;

    /// Second source register (bits 20-24).
    fn rs2(&self) -> usize;

    /// Function code distinguishing operations under one opcode (bits 12-14).
    fn funct3(&self) -> u32;

    /// Alternate-encoding selector (bits 25-31), e.g. ADD vs SUB.
    fn funct7(&self) -> u32;

    /// CSR address (bits 20-31).
    fn csr(&self) -> u32;
}

impl InstructionBits for u32 {
    #[inline(always)]
    fn opcode(&self) -> u32 {
        self & OPCODE_MASK
    }

    #[inline(always)]
    fn rd(&self) -> usize {
        ((self >> 7) & REG_MASK) as usize
    }

    #[inline(always)]
    fn rs1(&self) -> usize {
        ((self >> 15) & REG_MASK) as usize
    }

    #[inline(always)]
    fn rs2(&self) -> usize {
        ((self >> 20) & REG_MASK) as usize
    }

    #[inline(always)]
    fn funct3(&self) -> u32 {
        (self >> 12) & FUNCT3_MASK
    }

    #[inline(always)]
    fn funct7(&self) -> u32 {
        (self >> 25) & FUNCT7_MASK
    }

    #[inline(always)]
    fn csr(&self) -> u32 {
        (self >> 20) & CSR_MASK
    }
}

/// A decoded instruction.
///
/// `imm` holds the sign-extended immediate of whatever format the opcode
/// uses (0 for R-type).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Raw encoding.
    pub raw: u32,
    /// Major opcode.
    pub opcode: u32,
    /// Destination register.
    pub rd: usize,
    /// First source register.
    pub rs1: usize,
    /// Second source register.
    pub rs2: usize,
    /// funct3 field.
    pub funct3: u32,
    /// funct7 field.
    pub funct7: u32,
    /// Sign-extended immediate.
    pub imm: i32,
}
