//! Pipeline control signals and operation types.
//!
//! The decode stage turns an instruction into a `ControlSignals` bundle that
//! travels with it and steers the ALU, the branch unit, the memory stage and
//! the register/CSR writes at writeback.

use crate::common::MemWidth;

/// ALU operation (RV32I and the M extension).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AluOp {
    /// Integer addition.
    #[default]
    Add,
    /// Integer subtraction.
    Sub,
    /// Shift left logical.
    Sll,
    /// Set less than (signed).
    Slt,
    /// Set less than unsigned.
    Sltu,
    /// Bitwise XOR.
    Xor,
    /// Shift right logical.
    Srl,
    /// Shift right arithmetic.
    Sra,
    /// Bitwise OR.
    Or,
    /// Bitwise AND.
    And,
    /// Multiply (low 32 bits).
    Mul,
    /// Multiply high, signed x signed.
    Mulh,
    /// Multiply high, signed x unsigned.
    Mulhsu,
    /// Multiply high, unsigned x unsigned.
    Mulhu,
    /// Divide (signed).
    Div,
    /// Divide (unsigned).
    Divu,
    /// Remainder (signed).
    Rem,
    /// Remainder (unsigned).
    Remu,
}

/// Conditional branch comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BranchCond {
    /// Equal.
    #[default]
    Eq,
    /// Not equal.
    Ne,
    /// Less than (signed).
    Lt,
    /// Greater or equal (signed).
    Ge,
    /// Less than (unsigned).
    Ltu,
    /// Greater or equal (unsigned).
    Geu,
}

/// Source for ALU operand A.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpASrc {
    /// rs1 value.
    #[default]
    Reg1,
    /// Program counter (AUIPC, JAL).
    Pc,
    /// Zero (LUI).
    Zero,
}

/// Source for ALU operand B.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpBSrc {
    /// Sign-extended immediate.
    #[default]
    Imm,
    /// rs2 value.
    Reg2,
}

/// CSR operation type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CsrOp {
    /// No CSR operation.
    #[default]
    None,
    /// CSRRW.
    Rw,
    /// CSRRS.
    Rs,
    /// CSRRC.
    Rc,
    /// CSRRWI.
    Rwi,
    /// CSRRSI.
    Rsi,
    /// CSRRCI.
    Rci,
}

impl CsrOp {
    /// Returns `true` for the immediate forms, whose rs1 field is a 5-bit constant.
    pub fn is_immediate(self) -> bool {
        matches!(self, CsrOp::Rwi | CsrOp::Rsi | CsrOp::Rci)
    }
}

/// Control signals for one instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlSignals {
    /// Writes rd at writeback.
    pub reg_write: bool,
    /// Load.
    pub mem_read: bool,
    /// Store.
    pub mem_write: bool,
    /// Conditional branch.
    pub branch: bool,
    /// JAL or JALR.
    pub jump: bool,
    /// Memory access width.
    pub width: MemWidth,
    /// Load result is sign-extended.
    pub signed_load: bool,
    /// ALU operation.
    pub alu: AluOp,
    /// ALU operand A source.
    pub a_src: OpASrc,
    /// ALU operand B source.
    pub b_src: OpBSrc,
    /// Branch comparison.
    pub branch_cond: BranchCond,
    /// CSR operation.
    pub csr_op: CsrOp,
    /// CSR address.
    pub csr_addr: u32,
    /// The CSR instruction writes its CSR (not a pure read).
    pub csr_write: bool,
    /// MRET.
    pub is_mret: bool,
    /// FENCE.I.
    pub is_fence_i: bool,
}

impl ControlSignals {
    /// Returns `true` for instructions that read or write CSR state.
    ///
    /// Such instructions are serialized against each other at decode.
    pub fn touches_csr(&self) -> bool {
        self.csr_op != CsrOp::None || self.is_mret
    }
}
