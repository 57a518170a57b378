//! Execute (EX) Stage.
//!
//! This module implements the execution stage of the pipeline. It is responsible for:
//! - Resolving operand values using forwarding logic (from EX/MEM or MEM/WB).
//! - Performing ALU operations and computing load/store addresses.
//! - Resolving branches and jumps and verifying the fetch-time prediction.
//! - Reading CSRs and computing the CSR write committed at writeback.
//! - Redirecting `mret` to `mepc`.

use crate::common::error::Trap;
use crate::core::pipeline::hazards;
use crate::core::pipeline::latches::{ExMem, ExMemEntry, IdExEntry, MemWb};
use crate::core::pipeline::signals::{CsrOp, OpASrc, OpBSrc};
use crate::core::units::alu::Alu;
use crate::core::units::bru;
use crate::core::Cpu;
use crate::isa::instruction::InstructionBits;
use crate::isa::opcodes;

/// Bit mask to clear bit 0 of a JALR target.
const JALR_ALIGNMENT_MASK: u32 = !1;

/// Executes the Execute stage of the pipeline.
///
/// Consumes the ID/EX entry and produces the EX/MEM entry.
///
/// # Arguments
///
/// * `cpu` - Mutable reference to the CPU state.
/// * `ex_mem` - EX/MEM as it stood at the start of the cycle.
/// * `mem_wb` - MEM/WB as it stood at the start of the cycle.
///
/// # Returns
///
/// The corrected fetch address when the instruction's actual successor
/// differs from the one fetched after it.
pub fn execute_stage(cpu: &mut Cpu, ex_mem: &ExMem, mem_wb: &MemWb) -> Option<u32> {
    let Some(id) = cpu.id_ex.entry.take() else {
        cpu.ex_mem.entry = None;
        return None;
    };

    if let Some(trap) = id.trap {
        if cpu.trace {
            tracing::trace!(pc = id.pc, "EX  carrying trap {}", trap);
        }
        cpu.ex_mem.entry = Some(ExMemEntry {
            pc: id.pc,
            inst: id.inst,
            trap: Some(trap),
            ..Default::default()
        });
        return None;
    }

    let (rv1, rv2) = hazards::forward_rs(&id, ex_mem, mem_wb, cpu.trace);
    let ctrl = id.ctrl;
    let imm = id.imm as u32;

    let op_a = match ctrl.a_src {
        OpASrc::Reg1 => rv1,
        OpASrc::Pc => id.pc,
        OpASrc::Zero => 0,
    };
    let op_b = match ctrl.b_src {
        OpBSrc::Imm => imm,
        OpBSrc::Reg2 => rv2,
    };

    let mut alu = Alu::execute(ctrl.alu, op_a, op_b);
    let mut csr_write = None;
    let mut target = None;

    if ctrl.jump {
        alu = id.pc.wrapping_add(4);
        target = Some(if id.inst.opcode() == opcodes::OP_JALR {
            rv1.wrapping_add(imm) & JALR_ALIGNMENT_MASK
        } else {
            id.pc.wrapping_add(imm)
        });
    } else if ctrl.branch {
        if bru::branch_taken(ctrl.branch_cond, rv1, rv2) {
            target = Some(id.pc.wrapping_add(imm));
        }
    } else if ctrl.is_mret {
        target = Some(cpu.csrs.mepc);
    } else if ctrl.csr_op != CsrOp::None {
        let (value, write) = csr_access(cpu, &id, rv1);
        alu = value;
        csr_write = write;
    }

    let fall_through = id.pc.wrapping_add(4);
    let actual = target.unwrap_or(fall_through);
    if actual % 4 != 0 {
        cpu.ex_mem.entry = Some(ExMemEntry {
            pc: id.pc,
            inst: id.inst,
            trap: Some(Trap::InstructionAddressMisaligned(actual)),
            ..Default::default()
        });
        return None;
    }

    let predicted = if id.pred_taken {
        id.pred_target
    } else {
        fall_through
    };
    let mispredicted = actual != predicted;
    if ctrl.branch || ctrl.jump {
        cpu.stats.branch_predictions += 1;
        if mispredicted {
            cpu.stats.branch_mispredictions += 1;
        }
    }

    if cpu.trace {
        tracing::trace!(
            pc = id.pc,
            "EX  a={:#010x} b={:#010x} result={:#010x} next={:#010x}",
            op_a,
            op_b,
            alu,
            actual
        );
    }

    cpu.ex_mem.entry = Some(ExMemEntry {
        pc: id.pc,
        inst: id.inst,
        rd: id.rd,
        alu,
        store_data: rv2,
        ctrl,
        csr_write,
        trap: None,
    });

    mispredicted.then_some(actual)
}

/// Reads the CSR and computes the value to write back.
///
/// # Returns
///
/// `(old_value, Some((addr, new_value)))`, or `None` for a pure read.
fn csr_access(cpu: &Cpu, id: &IdExEntry, rv1: u32) -> (u32, Option<(u32, u32)>) {
    let ctrl = &id.ctrl;
    let old = cpu.csrs.read(ctrl.csr_addr).unwrap_or(0);
    let src = if ctrl.csr_op.is_immediate() {
        id.imm as u32
    } else {
        rv1
    };
    let new = match ctrl.csr_op {
        CsrOp::Rw | CsrOp::Rwi => src,
        CsrOp::Rs | CsrOp::Rsi => old | src,
        CsrOp::Rc | CsrOp::Rci => old & !src,
        CsrOp::None => old,
    };
    (old, ctrl.csr_write.then_some((ctrl.csr_addr, new)))
}
