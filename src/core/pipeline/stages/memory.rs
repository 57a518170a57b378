//! Memory Access (MEM) Stage.
//!
//! Loads and stores go through the data cache. A miss holds the stage (and
//! everything behind it) until the cache answers; the instruction moves on
//! to writeback only with valid data or a fault. Alignment is checked before
//! the cache is consulted, so a misaligned access never reaches the bus.
//!
//! `fence.i` is also performed here: it waits for any instruction fill,
//! cleans the data cache, invalidates the instruction cache and refetches
//! the next instruction.

use crate::common::error::Trap;
use crate::common::MemWidth;
use crate::core::pipeline::latches::{ExMemEntry, MemWbEntry};
use crate::core::units::cache::CacheAccess;
use crate::core::Cpu;

/// What the memory stage asks of the rest of the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemOutcome {
    /// The stage is holding its instruction; upstream must not advance.
    pub stall: bool,
    /// Younger instructions must be flushed and fetch restarted here.
    pub redirect: Option<u32>,
}

enum Step {
    Done(u32),
    Stall,
    Trap(Trap),
    Refetch,
}

/// Executes the memory access stage.
pub fn mem_stage(cpu: &mut Cpu) -> MemOutcome {
    let Some(ex) = cpu.ex_mem.entry.take() else {
        cpu.mem_wb.entry = None;
        return MemOutcome::default();
    };

    let step = if ex.trap.is_some() {
        Step::Done(ex.alu)
    } else if ex.ctrl.mem_read {
        load(cpu, &ex)
    } else if ex.ctrl.mem_write {
        store(cpu, &ex)
    } else if ex.ctrl.is_fence_i {
        fence_i(cpu)
    } else {
        Step::Done(ex.alu)
    };

    let mut outcome = MemOutcome::default();
    let (result, trap) = match step {
        Step::Stall => {
            cpu.ex_mem.entry = Some(ex);
            cpu.mem_wb.entry = None;
            cpu.stats.stalls_mem += 1;
            outcome.stall = true;
            return outcome;
        }
        Step::Done(value) => (value, ex.trap),
        Step::Trap(trap) => (0, Some(trap)),
        Step::Refetch => {
            outcome.redirect = Some(ex.pc.wrapping_add(4));
            (0, None)
        }
    };

    if cpu.trace {
        tracing::trace!(pc = ex.pc, "MEM result={:#010x} trap={:?}", result, trap);
    }

    cpu.mem_wb.entry = Some(MemWbEntry {
        pc: ex.pc,
        inst: ex.inst,
        rd: ex.rd,
        result,
        ctrl: ex.ctrl,
        csr_write: ex.csr_write,
        trap,
    });
    outcome
}

fn load(cpu: &mut Cpu, ex: &ExMemEntry) -> Step {
    let addr = ex.alu;
    let width = ex.ctrl.width;
    if !width.is_aligned(addr) {
        return Step::Trap(Trap::LoadAddressMisaligned(addr));
    }
    match cpu.dcache.load(addr, &mut cpu.bridge) {
        CacheAccess::Hit(word) => Step::Done(extract(word, addr, width, ex.ctrl.signed_load)),
        CacheAccess::Stall => Step::Stall,
        CacheAccess::Fault(err) => {
            tracing::debug!(pc = ex.pc, "MEM load {:#010x} failed: {}", addr, err);
            Step::Trap(Trap::LoadAccessFault(addr))
        }
    }
}

fn store(cpu: &mut Cpu, ex: &ExMemEntry) -> Step {
    let addr = ex.alu;
    let width = ex.ctrl.width;
    if !width.is_aligned(addr) {
        return Step::Trap(Trap::StoreAddressMisaligned(addr));
    }
    match cpu.dcache.store(addr, width, ex.store_data, &mut cpu.bridge) {
        CacheAccess::Hit(()) => Step::Done(0),
        CacheAccess::Stall => Step::Stall,
        CacheAccess::Fault(err) => {
            tracing::debug!(pc = ex.pc, "MEM store {:#010x} failed: {}", addr, err);
            Step::Trap(Trap::StoreAccessFault(addr))
        }
    }
}

fn fence_i(cpu: &mut Cpu) -> Step {
    // a fill started before the fence could install pre-fence bytes
    if cpu.icache.is_filling() {
        return Step::Stall;
    }
    match cpu.dcache.clean_all(&mut cpu.bridge) {
        CacheAccess::Hit(()) => {
            cpu.icache.invalidate_all();
            Step::Refetch
        }
        CacheAccess::Stall => Step::Stall,
        CacheAccess::Fault(err) => Step::Trap(Trap::StoreAccessFault(err.addr())),
    }
}

/// Extracts a load result from the aligned word holding it.
///
/// # Arguments
///
/// * `word` - The 32-bit word containing the addressed bytes.
/// * `addr` - Load address (its low bits select the byte lane).
/// * `width` - Access width.
/// * `signed` - Sign-extend sub-word results.
pub fn extract(word: u32, addr: u32, width: MemWidth, signed: bool) -> u32 {
    let raw = word >> ((addr & 3) * 8);
    match (width, signed) {
        (MemWidth::Byte, true) => raw as u8 as i8 as i32 as u32,
        (MemWidth::Byte, false) => raw & 0xff,
        (MemWidth::Half, true) => raw as u16 as i16 as i32 as u32,
        (MemWidth::Half, false) => raw & 0xffff,
        (MemWidth::Word, _) | (MemWidth::Nop, _) => word,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_word_loads_extend() {
        let word = 0x80ff_7f01;
        assert_eq!(extract(word, 0x100, MemWidth::Byte, true), 0x01);
        assert_eq!(extract(word, 0x102, MemWidth::Byte, true), 0xffff_ffff);
        assert_eq!(extract(word, 0x102, MemWidth::Byte, false), 0xff);
        assert_eq!(extract(word, 0x102, MemWidth::Half, true), 0xffff_80ff);
        assert_eq!(extract(word, 0x102, MemWidth::Half, false), 0x80ff);
        assert_eq!(extract(word, 0x100, MemWidth::Word, true), word);
    }
}
