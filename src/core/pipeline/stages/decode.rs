//! Instruction Decode (ID) Stage.
//!
//! Decode turns the instruction in IF/ID into control signals, reads its
//! source registers and fills ID/EX. Instructions that cannot be decoded are
//! not rejected here: they carry an illegal-instruction trap to writeback,
//! where traps are taken in program order.

use crate::common::error::Trap;
use crate::common::MemWidth;
use crate::core::arch::csr::{self, Csrs};
use crate::core::pipeline::latches::IdExEntry;
use crate::core::pipeline::signals::{AluOp, BranchCond, ControlSignals, CsrOp, OpASrc, OpBSrc};
use crate::core::Cpu;
use crate::isa::decode::{decode, source_regs};
use crate::isa::instruction::{Decoded, InstructionBits};
use crate::isa::{funct3, funct7, opcodes, sys_ops};

/// Executes the instruction decode stage.
///
/// Moves the IF/ID entry into ID/EX, or leaves a bubble when IF/ID is empty.
pub fn decode_stage(cpu: &mut Cpu) {
    let Some(if_entry) = cpu.if_id.entry.take() else {
        cpu.id_ex.entry = None;
        return;
    };

    let d = decode(if_entry.inst);
    let (ctrl, trap) = match if_entry.trap {
        Some(trap) => (ControlSignals::default(), Some(trap)),
        None => match control_signals(&d, if_entry.pc) {
            Ok(ctrl) => (ctrl, None),
            Err(trap) => (ControlSignals::default(), Some(trap)),
        },
    };

    let (rs1, rs2) = match trap {
        Some(_) => (None, None),
        None => source_regs(&d),
    };
    let rs1 = rs1.unwrap_or(0);
    let rs2 = rs2.unwrap_or(0);

    if cpu.trace {
        tracing::trace!(
            pc = if_entry.pc,
            "ID  inst={:#010x} rd=x{} rs1=x{} rs2=x{} imm={:#x}",
            if_entry.inst,
            d.rd,
            rs1,
            rs2,
            d.imm
        );
    }

    cpu.id_ex.entry = Some(IdExEntry {
        pc: if_entry.pc,
        inst: if_entry.inst,
        rs1,
        rs2,
        rd: if ctrl.reg_write { d.rd } else { 0 },
        imm: if ctrl.csr_op.is_immediate() {
            d.rs1 as i32
        } else {
            d.imm
        },
        rv1: cpu.regs.read(rs1),
        rv2: cpu.regs.read(rs2),
        ctrl,
        trap,
        pred_taken: if_entry.pred_taken,
        pred_target: if_entry.pred_target,
    });
}

/// Generates the control signals of a decoded instruction.
///
/// # Arguments
///
/// * `d` - Decoded instruction fields.
/// * `pc` - Program counter of the instruction (needed for `ebreak`).
///
/// # Returns
///
/// The control bundle, or the trap the instruction raises unconditionally
/// (illegal encoding, `ecall`, `ebreak`).
pub fn control_signals(d: &Decoded, pc: u32) -> Result<ControlSignals, Trap> {
    let illegal = Trap::IllegalInstruction(d.raw);
    let mut c = ControlSignals::default();

    match d.opcode {
        opcodes::OP_LUI => {
            c.reg_write = true;
            c.a_src = OpASrc::Zero;
        }
        opcodes::OP_AUIPC => {
            c.reg_write = true;
            c.a_src = OpASrc::Pc;
        }
        opcodes::OP_JAL => {
            c.reg_write = true;
            c.jump = true;
            c.a_src = OpASrc::Pc;
        }
        opcodes::OP_JALR => {
            if d.funct3 != 0 {
                return Err(illegal);
            }
            c.reg_write = true;
            c.jump = true;
        }
        opcodes::OP_BRANCH => {
            c.branch = true;
            c.b_src = OpBSrc::Reg2;
            c.branch_cond = match d.funct3 {
                funct3::BEQ => BranchCond::Eq,
                funct3::BNE => BranchCond::Ne,
                funct3::BLT => BranchCond::Lt,
                funct3::BGE => BranchCond::Ge,
                funct3::BLTU => BranchCond::Ltu,
                funct3::BGEU => BranchCond::Geu,
                _ => return Err(illegal),
            };
        }
        opcodes::OP_LOAD => {
            c.reg_write = true;
            c.mem_read = true;
            (c.width, c.signed_load) = match d.funct3 {
                funct3::LB => (MemWidth::Byte, true),
                funct3::LH => (MemWidth::Half, true),
                funct3::LW => (MemWidth::Word, true),
                funct3::LBU => (MemWidth::Byte, false),
                funct3::LHU => (MemWidth::Half, false),
                _ => return Err(illegal),
            };
        }
        opcodes::OP_STORE => {
            c.mem_write = true;
            c.width = match d.funct3 {
                funct3::SB => MemWidth::Byte,
                funct3::SH => MemWidth::Half,
                funct3::SW => MemWidth::Word,
                _ => return Err(illegal),
            };
        }
        opcodes::OP_IMM => {
            c.reg_write = true;
            c.alu = match d.funct3 {
                funct3::ADD_SUB => AluOp::Add,
                funct3::SLT => AluOp::Slt,
                funct3::SLTU => AluOp::Sltu,
                funct3::XOR => AluOp::Xor,
                funct3::OR => AluOp::Or,
                funct3::AND => AluOp::And,
                funct3::SLL if d.funct7 == funct7::DEFAULT => AluOp::Sll,
                funct3::SRL_SRA if d.funct7 == funct7::DEFAULT => AluOp::Srl,
                funct3::SRL_SRA if d.funct7 == funct7::SUB_SRA => AluOp::Sra,
                _ => return Err(illegal),
            };
        }
        opcodes::OP_REG => {
            c.reg_write = true;
            c.b_src = OpBSrc::Reg2;
            c.alu = match (d.funct7, d.funct3) {
                (funct7::DEFAULT, funct3::ADD_SUB) => AluOp::Add,
                (funct7::SUB_SRA, funct3::ADD_SUB) => AluOp::Sub,
                (funct7::DEFAULT, funct3::SLL) => AluOp::Sll,
                (funct7::DEFAULT, funct3::SLT) => AluOp::Slt,
                (funct7::DEFAULT, funct3::SLTU) => AluOp::Sltu,
                (funct7::DEFAULT, funct3::XOR) => AluOp::Xor,
                (funct7::DEFAULT, funct3::SRL_SRA) => AluOp::Srl,
                (funct7::SUB_SRA, funct3::SRL_SRA) => AluOp::Sra,
                (funct7::DEFAULT, funct3::OR) => AluOp::Or,
                (funct7::DEFAULT, funct3::AND) => AluOp::And,
                (funct7::MULDIV, funct3::MUL) => AluOp::Mul,
                (funct7::MULDIV, funct3::MULH) => AluOp::Mulh,
                (funct7::MULDIV, funct3::MULHSU) => AluOp::Mulhsu,
                (funct7::MULDIV, funct3::MULHU) => AluOp::Mulhu,
                (funct7::MULDIV, funct3::DIV) => AluOp::Div,
                (funct7::MULDIV, funct3::DIVU) => AluOp::Divu,
                (funct7::MULDIV, funct3::REM) => AluOp::Rem,
                (funct7::MULDIV, funct3::REMU) => AluOp::Remu,
                _ => return Err(illegal),
            };
        }
        opcodes::OP_MISC_MEM => match d.funct3 {
            funct3::FENCE => {}
            funct3::FENCE_I => c.is_fence_i = true,
            _ => return Err(illegal),
        },
        opcodes::OP_SYSTEM => return system_signals(d, pc, c),
        _ => return Err(illegal),
    }

    Ok(c)
}

fn system_signals(d: &Decoded, pc: u32, mut c: ControlSignals) -> Result<ControlSignals, Trap> {
    let illegal = Trap::IllegalInstruction(d.raw);

    if d.funct3 == funct3::PRIV {
        return match d.raw {
            sys_ops::ECALL => Err(Trap::EnvironmentCall),
            sys_ops::EBREAK => Err(Trap::Breakpoint(pc)),
            sys_ops::MRET => {
                c.is_mret = true;
                Ok(c)
            }
            sys_ops::WFI => Ok(c),
            _ => Err(illegal),
        };
    }

    c.csr_op = match d.funct3 {
        funct3::CSRRW => CsrOp::Rw,
        funct3::CSRRS => CsrOp::Rs,
        funct3::CSRRC => CsrOp::Rc,
        funct3::CSRRWI => CsrOp::Rwi,
        funct3::CSRRSI => CsrOp::Rsi,
        funct3::CSRRCI => CsrOp::Rci,
        _ => return Err(illegal),
    };

    let addr = d.raw.csr();
    if !Csrs::exists(addr) {
        return Err(illegal);
    }
    // rs1 doubles as the 5-bit immediate in the immediate forms
    c.csr_write = match c.csr_op {
        CsrOp::Rw | CsrOp::Rwi => true,
        _ => d.rs1 != 0,
    };
    if c.csr_write && csr::is_read_only(addr) {
        return Err(illegal);
    }

    c.csr_addr = addr;
    c.reg_write = true;
    Ok(c)
}
