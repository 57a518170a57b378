//! Data Hazard Detection and Forwarding.
//!
//! Read-after-write hazards are resolved three ways:
//!
//! 1. **Forwarding:** Execute takes a pending result from EX/MEM (one ahead)
//!    or MEM/WB (two ahead) instead of the stale register-file value.
//! 2. **Capture:** an instruction held in ID/EX while the pipeline is stalled
//!    picks up the value committed by writeback each cycle, so nothing is
//!    lost when the producer drains past the forwarding window.
//! 3. **Load-use stall:** a load's data only exists after Memory, so an
//!    instruction that needs it immediately is held in Decode for one cycle.

use crate::core::pipeline::latches::{ExMem, IdEx, IdExEntry, IfId, MemWb};
use crate::isa::decode::{decode, source_regs};
use crate::isa::opcodes::OP_SYSTEM;
use crate::isa::sys_ops;

/// Checks if a pipeline stall is needed due to a load-use data hazard.
///
/// # Arguments
///
/// * `ex_mem` - The EX/MEM latch holding the instruction that just executed
/// * `if_id` - The IF/ID latch holding the instruction about to be decoded
///
/// # Returns
///
/// `true` if the decoded instruction reads the register the load writes.
pub fn need_stall_load_use(ex_mem: &ExMem, if_id: &IfId) -> bool {
    let Some(load) = ex_mem.entry.as_ref() else {
        return false;
    };
    if !load.ctrl.mem_read || load.rd == 0 || load.trap.is_some() {
        return false;
    }
    let Some(next) = if_id.entry.as_ref() else {
        return false;
    };

    let (rs1, rs2) = source_regs(&decode(next.inst));
    rs1 == Some(load.rd) || rs2 == Some(load.rd)
}

/// Checks if a CSR access must wait for older CSR accesses to commit.
///
/// CSR writes are committed at writeback, so a CSR instruction (or MRET,
/// which reads `mepc`) is held in Decode while any older CSR instruction is
/// still in Execute, Memory or Writeback.
pub fn need_stall_csr(if_id: &IfId, id_ex: &IdEx, ex_mem: &ExMem, mem_wb: &MemWb) -> bool {
    let Some(next) = if_id.entry.as_ref() else {
        return false;
    };
    let d = decode(next.inst);
    let next_is_csr = (d.opcode == OP_SYSTEM && d.funct3 != 0) || next.inst == sys_ops::MRET;
    if !next_is_csr {
        return false;
    }

    id_ex.entry.as_ref().is_some_and(|e| e.ctrl.touches_csr())
        || ex_mem.entry.as_ref().is_some_and(|e| e.ctrl.touches_csr())
        || mem_wb.entry.as_ref().is_some_and(|e| e.ctrl.touches_csr())
}

/// Register write an EX/MEM entry can forward (loads cannot).
fn ex_mem_value(ex_mem: &ExMem) -> Option<(usize, u32)> {
    let e = ex_mem.entry.as_ref()?;
    (e.ctrl.reg_write && !e.ctrl.mem_read && e.rd != 0 && e.trap.is_none()).then_some((e.rd, e.alu))
}

/// Register write a MEM/WB entry carries (including load data).
fn mem_wb_value(mem_wb: &MemWb) -> Option<(usize, u32)> {
    let e = mem_wb.entry.as_ref()?;
    (e.ctrl.reg_write && e.rd != 0 && e.trap.is_none()).then_some((e.rd, e.result))
}

/// Updates the operands of a held ID/EX entry with the value writeback
/// commits this cycle.
pub fn capture_writeback(id_ex: &mut IdEx, mem_wb: &MemWb) {
    let (Some(entry), Some((rd, val))) = (id_ex.entry.as_mut(), mem_wb_value(mem_wb)) else {
        return;
    };
    if entry.rs1 == rd {
        entry.rv1 = val;
    }
    if entry.rs2 == rd {
        entry.rv2 = val;
    }
}

/// Forwards register values from later pipeline stages.
///
/// # Arguments
///
/// * `id_entry` - The instruction entering Execute
/// * `ex_mem` - EX/MEM as it stood at the start of the cycle (one ahead)
/// * `mem_wb` - MEM/WB as it stood at the start of the cycle (two ahead)
/// * `trace` - Emit a trace event for each forwarded operand
///
/// # Returns
///
/// `(rs1_value, rs2_value)`, preferring the youngest producer.
pub fn forward_rs(id_entry: &IdExEntry, ex_mem: &ExMem, mem_wb: &MemWb, trace: bool) -> (u32, u32) {
    let mut a = id_entry.rv1;
    let mut b = id_entry.rv2;

    for (source, producer) in [("MEM/WB", mem_wb_value(mem_wb)), ("EX/MEM", ex_mem_value(ex_mem))] {
        let Some((rd, val)) = producer else {
            continue;
        };
        if id_entry.rs1 == rd {
            a = val;
            if trace {
                tracing::trace!(pc = id_entry.pc, "forward rs1=x{} {:#010x} from {}", rd, val, source);
            }
        }
        if id_entry.rs2 == rd {
            b = val;
            if trace {
                tracing::trace!(pc = id_entry.pc, "forward rs2=x{} {:#010x} from {}", rd, val, source);
            }
        }
    }

    (a, b)
}
