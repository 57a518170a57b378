//! Central Processing Unit.
//!
//! The `Cpu` owns the architectural state, the five pipeline latches, both
//! first-level caches, the bridge to the bus and the `System` behind it.
//! One call to [`Cpu::tick`] is one rising clock edge for the whole SoC.

use crate::common::{Clock, Trap};
use crate::config::Config;
use crate::core::arch::csr::Csrs;
use crate::core::arch::gpr::Gpr;
use crate::core::arch::trap::{TrapHandler, TrapRecord, TrapSummary};
use crate::core::pipeline::hazards;
use crate::core::pipeline::latches::{ExMem, IdEx, IfId, MemWb};
use crate::core::pipeline::stages;
use crate::core::pipeline::traits::PipelineLatch;
use crate::core::units::bru::StaticPredictor;
use crate::core::units::cache::dcache::DataCache;
use crate::core::units::cache::icache::InstructionCache;
use crate::core::units::mem_to_bus::MemToBus;
use crate::soc::System;
use crate::stats::SimStats;

/// Cycles allowed for outstanding bus traffic after an exit request.
const DRAIN_LIMIT: u64 = 100_000;

/// How a bounded run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Software wrote an exit request to the system controller.
    Exited(u64),
    /// A trap was taken with `halt_on_trap` set.
    Halted(TrapRecord),
    /// The cycle budget ran out.
    CycleLimit,
}

/// RV32 core with its private caches and the SoC it drives.
pub struct Cpu {
    /// Integer register file.
    pub regs: Gpr,
    /// Control and status registers.
    pub csrs: Csrs,
    /// Next fetch address.
    pub pc: u32,
    /// Emit per-stage trace events.
    pub trace: bool,
    /// Bus and everything behind it.
    pub system: System,

    /// IF/ID latch.
    pub if_id: IfId,
    /// ID/EX latch.
    pub id_ex: IdEx,
    /// EX/MEM latch.
    pub ex_mem: ExMem,
    /// MEM/WB latch.
    pub mem_wb: MemWb,

    /// First-level instruction cache.
    pub icache: InstructionCache,
    /// First-level data cache.
    pub dcache: DataCache,
    /// Cache-to-bus bridge.
    pub bridge: MemToBus,
    /// Fetch-time branch predictor.
    pub predictor: StaticPredictor,

    /// Core performance counters.
    pub stats: SimStats,
    /// Clock for the next edge.
    pub clock: Clock,
    /// Handler address.
    pub trap_vector: u32,
    /// Report traps to the caller instead of only entering the handler.
    pub halt_on_trap: bool,
    /// Most recently taken trap.
    pub last_trap: Option<TrapRecord>,
    /// Exit code requested by software, not yet taken.
    pub exit_code: Option<u64>,
    /// Fetch is waiting for a redirect after a fetch fault.
    pub fetch_stopped: bool,
    start_pc: u32,
}

impl Cpu {
    /// Creates a core in its reset state attached to `system`.
    pub fn new(system: System, config: &Config) -> Self {
        Self {
            regs: Gpr::new(),
            csrs: Csrs::new(),
            pc: config.general.start_pc,
            trace: config.general.trace_instructions || cfg!(feature = "always-trace"),
            system,
            if_id: IfId::default(),
            id_ex: IdEx::default(),
            ex_mem: ExMem::default(),
            mem_wb: MemWb::default(),
            icache: InstructionCache::new(&config.cache.icache),
            dcache: DataCache::new(&config.cache.dcache),
            bridge: MemToBus::new(config.bus.max_burst),
            predictor: StaticPredictor::new(config.pipeline.branch_predictor),
            stats: SimStats::default(),
            clock: Clock::default(),
            trap_vector: config.general.trap_vector,
            halt_on_trap: config.general.halt_on_trap,
            last_trap: None,
            exit_code: None,
            fetch_stopped: false,
            start_pc: config.general.start_pc,
        }
    }

    /// Advances the SoC by one clock edge.
    ///
    /// Stages are evaluated from Writeback back to Fetch, each reading the
    /// latch contents left by the previous edge, followed by the bridge and
    /// the bus.
    ///
    /// # Errors
    ///
    /// Returns the trap taken this cycle when `halt_on_trap` is set. The
    /// handler has already been entered; ticking again continues there.
    pub fn tick(&mut self) -> Result<(), Trap> {
        let clk = self.clock;
        self.csrs.cycle = clk.cycle;
        self.stats.cycles += 1;

        let ex_mem_prev = self.ex_mem.clone();
        let mem_wb_prev = self.mem_wb.clone();

        self.icache.tick(clk, &mut self.bridge);
        self.dcache.tick(clk, &mut self.bridge);
        hazards::capture_writeback(&mut self.id_ex, &mem_wb_prev);

        if let Some((trap, pc)) = stages::wb_stage(self) {
            self.take_trap(trap, pc);
            self.advance_bus(clk);
            if self.halt_on_trap {
                return Err(trap);
            }
            return Ok(());
        }

        let mem = stages::mem_stage(self);
        let mut redirected = false;
        if let Some(target) = mem.redirect {
            self.if_id.flush();
            self.id_ex.flush();
            self.redirect(target);
            redirected = true;
        }

        if !mem.stall {
            if let Some(target) = stages::execute_stage(self, &ex_mem_prev, &mem_wb_prev) {
                self.if_id.flush();
                self.redirect(target);
                redirected = true;
            } else if hazards::need_stall_load_use(&self.ex_mem, &self.if_id)
                || hazards::need_stall_csr(&self.if_id, &self.id_ex, &self.ex_mem, &self.mem_wb)
            {
                self.id_ex.flush();
                self.stats.stalls_data += 1;
            } else {
                stages::decode_stage(self);
            }
        }

        // The corrected target is fetched on the next edge.
        if !redirected {
            stages::fetch_stage(self);
        }
        self.advance_bus(clk);
        Ok(())
    }

    /// Sets the address fetched now and after every reset.
    pub fn set_entry(&mut self, pc: u32) {
        self.pc = pc;
        self.start_pc = pc;
    }

    /// Asserts reset for one clock edge.
    ///
    /// Every controller drops its in-flight work, the latches are emptied
    /// and fetch restarts at the configured start address. Cache contents,
    /// memory and the register file are left as they are.
    pub fn reset(&mut self) {
        let clk = Clock {
            reset: true,
            ..self.clock
        };
        tracing::info!(cycle = clk.cycle, "cpu: reset");

        self.icache.tick(clk, &mut self.bridge);
        self.dcache.tick(clk, &mut self.bridge);
        self.bridge.tick(clk, &mut self.system.bus);
        self.system.tick(clk);

        self.if_id.flush();
        self.id_ex.flush();
        self.ex_mem.flush();
        self.mem_wb.flush();
        self.pc = self.start_pc;
        self.fetch_stopped = false;
        self.exit_code = None;
        self.last_trap = None;
        self.clock = clk.next();
    }

    fn advance_bus(&mut self, clk: Clock) {
        self.bridge.tick(clk, &mut self.system.bus);
        self.system.tick(clk);
        if self.exit_code.is_none() {
            self.exit_code = self.system.check_exit();
        }
        self.clock = clk.next();
    }

    /// Restarts fetch at `target`.
    pub fn redirect(&mut self, target: u32) {
        if self.trace {
            tracing::trace!("redirect to {:#010x}", target);
        }
        self.pc = target;
        self.fetch_stopped = false;
        self.stats.stalls_control += 1;
    }

    /// Takes `trap` raised by the instruction at `pc`.
    ///
    /// Every in-flight instruction is younger than the faulting one and is
    /// squashed; fetch resumes at the trap vector.
    pub fn take_trap(&mut self, trap: Trap, pc: u32) {
        let record = TrapRecord {
            trap,
            pc,
            cycle: self.clock.cycle,
        };
        tracing::warn!(
            pc,
            cycle = record.cycle,
            "trap: {} (mcause={})",
            trap,
            trap.cause()
        );

        let vector = TrapHandler::enter(&mut self.csrs, trap, pc, self.trap_vector);
        self.if_id.flush();
        self.id_ex.flush();
        self.ex_mem.flush();
        self.mem_wb.flush();
        self.redirect(vector);

        self.stats.traps_taken += 1;
        self.last_trap = Some(record);
    }

    /// Takes the pending exit code, if software requested one.
    pub fn take_exit(&mut self) -> Option<u64> {
        self.exit_code.take()
    }

    /// Ticks until software exits, a halting trap is taken or
    /// `max_cycles` edges have elapsed.
    pub fn run(&mut self, max_cycles: u64) -> RunOutcome {
        for _ in 0..max_cycles {
            if let Err(trap) = self.tick() {
                let record = self.last_trap.unwrap_or(TrapRecord {
                    trap,
                    pc: self.csrs.mepc,
                    cycle: self.clock.cycle,
                });
                return RunOutcome::Halted(record);
            }
            if let Some(code) = self.take_exit() {
                self.drain();
                return RunOutcome::Exited(code);
            }
        }
        RunOutcome::CycleLimit
    }

    /// Keeps ticking until the bridge has delivered every queued line
    /// operation, so writes cleaned alongside the exit request still reach
    /// their slaves.
    fn drain(&mut self) {
        for _ in 0..DRAIN_LIMIT {
            if self.bridge.is_idle() && !self.system.bus.is_busy() {
                return;
            }
            if self.tick().is_err() {
                return;
            }
        }
        tracing::warn!("exit: bridge still busy after {} cycles", DRAIN_LIMIT);
    }

    /// Returns `true` when no instruction is in flight in any stage.
    pub fn pipeline_empty(&self) -> bool {
        self.if_id.is_empty() && self.id_ex.is_empty() && self.ex_mem.is_empty() && self.mem_wb.is_empty()
    }

    /// Collects the core counters and every block's statistics.
    pub fn report(&self) -> SimStats {
        let mut stats = self.stats.clone();
        stats.icache = self.icache.stats.clone();
        stats.dcache = self.dcache.stats.clone();
        stats.bus = self.system.bus.stats.clone();
        stats.bus_cache = self.system.bus.bus_cache().map(|bc| bc.stats.clone());
        stats.last_trap = self.last_trap.as_ref().map(TrapSummary::from);
        stats
    }

    /// Prints the program counter and the register file.
    pub fn dump_state(&self) {
        println!("PC = {:#010x}", self.pc);
        println!("{}", self.regs.dump());
        println!(
            "mepc={:#010x} mcause={:#x} mtval={:#010x}",
            self.csrs.mepc, self.csrs.mcause, self.csrs.mtval
        );
    }
}
