//! Writeback (WB) Stage.
//!
//! The commit point of the pipeline. Register and CSR writes become
//! architectural here, and a trap recorded anywhere upstream is reported
//! here so the caller can enter the handler with everything older already
//! committed and nothing younger visible.

use crate::common::error::Trap;
use crate::core::Cpu;

/// Executes the writeback stage.
///
/// # Returns
///
/// `Some((trap, pc))` if the instruction reaching writeback faulted; it
/// then has no architectural effect.
pub fn wb_stage(cpu: &mut Cpu) -> Option<(Trap, u32)> {
    let wb = cpu.mem_wb.entry.take()?;

    if let Some(trap) = wb.trap {
        return Some((trap, wb.pc));
    }

    if wb.ctrl.reg_write && wb.rd != 0 {
        cpu.regs.write(wb.rd, wb.result);
        if cpu.trace {
            tracing::trace!(pc = wb.pc, "WB  x{} <= {:#010x}", wb.rd, wb.result);
        }
    }
    if let Some((addr, val)) = wb.csr_write {
        if !cpu.csrs.write(addr, val) {
            tracing::warn!(pc = wb.pc, "WB  dropped write to csr {:#05x}", addr);
        } else if cpu.trace {
            tracing::trace!(pc = wb.pc, "WB  csr {:#05x} <= {:#010x}", addr, val);
        }
    }

    cpu.csrs.instret += 1;
    cpu.stats.instructions_retired += 1;
    let ctrl = &wb.ctrl;
    if ctrl.mem_read {
        cpu.stats.inst_load += 1;
    } else if ctrl.mem_write {
        cpu.stats.inst_store += 1;
    } else if ctrl.branch {
        cpu.stats.inst_branch += 1;
    } else if ctrl.jump {
        cpu.stats.inst_jump += 1;
    } else if ctrl.touches_csr() || ctrl.is_fence_i {
        cpu.stats.inst_system += 1;
    } else {
        cpu.stats.inst_alu += 1;
    }

    None
}
