//! Instruction Fetch (IF) Stage.
//!
//! Fetch reads one instruction per cycle from the instruction cache into the
//! IF/ID latch and chooses the next program counter with the static
//! predictor. It only runs when the latch is free; a latch held by a Decode
//! stall applies backpressure here.

use crate::common::error::Trap;
use crate::core::pipeline::latches::IfIdEntry;
use crate::core::pipeline::traits::PipelineLatch;
use crate::core::units::cache::CacheAccess;
use crate::core::Cpu;
use crate::isa::sys_ops;

/// Executes the instruction fetch stage.
///
/// A fault stops fetching until the next redirect: the trap travels down
/// the pipeline and its handler address arrives through a redirect.
pub fn fetch_stage(cpu: &mut Cpu) {
    if cpu.fetch_stopped || !cpu.if_id.is_empty() {
        return;
    }

    let pc = cpu.pc;
    if pc % 4 != 0 {
        fetch_fault(cpu, Trap::InstructionAddressMisaligned(pc));
        return;
    }

    match cpu.icache.fetch(pc, &mut cpu.bridge) {
        CacheAccess::Hit(inst) => {
            let prediction = cpu.predictor.predict(pc, inst);
            if cpu.trace {
                tracing::trace!(pc, "IF  inst={:#010x} pred={:x?}", inst, prediction);
            }
            cpu.if_id.entry = Some(IfIdEntry {
                pc,
                inst,
                pred_taken: prediction.is_some(),
                pred_target: prediction.unwrap_or(0),
                trap: None,
            });
            cpu.pc = prediction.unwrap_or(pc.wrapping_add(4));
        }
        CacheAccess::Stall => cpu.stats.stalls_fetch += 1,
        CacheAccess::Fault(err) => {
            tracing::debug!(pc, "IF  fetch failed: {}", err);
            fetch_fault(cpu, Trap::InstructionAccessFault(pc));
        }
    }
}

fn fetch_fault(cpu: &mut Cpu, trap: Trap) {
    cpu.if_id.entry = Some(IfIdEntry {
        pc: cpu.pc,
        inst: sys_ops::NOP,
        trap: Some(trap),
        ..Default::default()
    });
    cpu.fetch_stopped = true;
}
