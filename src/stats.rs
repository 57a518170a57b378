//! Simulation statistics collection and reporting.
//!
//! The core updates its own counters every cycle; the caches, the bus and
//! the bus cache keep theirs locally and are folded in when a report is
//! taken. Reports print as a table or serialize to JSON.

use std::time::Instant;

use serde::Serialize;

use crate::common::SimError;
use crate::core::arch::trap::TrapSummary;
use crate::core::units::cache::CacheStats;
use crate::soc::bus_cache::BusCacheStats;
use crate::soc::interconnect::BusStats;

/// Simulation statistics structure tracking all performance metrics.
#[derive(Clone, Debug, Serialize)]
pub struct SimStats {
    #[serde(skip)]
    start_time: Instant,
    /// Elapsed clock cycles.
    pub cycles: u64,
    /// Instructions that completed writeback.
    pub instructions_retired: u64,

    /// Retired loads.
    pub inst_load: u64,
    /// Retired stores.
    pub inst_store: u64,
    /// Retired conditional branches.
    pub inst_branch: u64,
    /// Retired JAL/JALR.
    pub inst_jump: u64,
    /// Retired ALU instructions (including LUI/AUIPC).
    pub inst_alu: u64,
    /// Retired CSR, MRET and fence instructions.
    pub inst_system: u64,

    /// Control transfers resolved in Execute.
    pub branch_predictions: u64,
    /// Resolved transfers whose prediction was wrong.
    pub branch_mispredictions: u64,

    /// Cycles Memory held the pipeline on a cache access.
    pub stalls_mem: u64,
    /// Cycles lost to redirects (mispredicts, MRET, FENCE.I).
    pub stalls_control: u64,
    /// Load-use and CSR serialization bubbles.
    pub stalls_data: u64,
    /// Cycles Fetch waited on the instruction cache.
    pub stalls_fetch: u64,

    /// Traps taken at writeback.
    pub traps_taken: u64,
    /// Most recent trap.
    pub last_trap: Option<TrapSummary>,

    /// Instruction cache counters.
    pub icache: CacheStats,
    /// Data cache counters.
    pub dcache: CacheStats,
    /// Bus counters.
    pub bus: BusStats,
    /// Bus cache counters, when one is attached.
    pub bus_cache: Option<BusCacheStats>,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            instructions_retired: 0,
            inst_load: 0,
            inst_store: 0,
            inst_branch: 0,
            inst_jump: 0,
            inst_alu: 0,
            inst_system: 0,
            branch_predictions: 0,
            branch_mispredictions: 0,
            stalls_mem: 0,
            stalls_control: 0,
            stalls_data: 0,
            stalls_fetch: 0,
            traps_taken: 0,
            last_trap: None,
            icache: CacheStats::default(),
            dcache: CacheStats::default(),
            bus: BusStats::default(),
            bus_cache: None,
        }
    }
}

impl SimStats {
    /// Instructions per cycle.
    pub fn ipc(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.instructions_retired as f64 / self.cycles as f64
        }
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Prints a formatted summary of all simulation statistics.
    pub fn print(&self) {
        let seconds = self.start_time.elapsed().as_secs_f64();
        let cyc = self.cycles.max(1) as f64;
        let instr = self.instructions_retired.max(1) as f64;
        let pct = |n: u64, of: f64| (n as f64 / of) * 100.0;

        println!("\n==========================================================");
        println!("RV32 SOC SIMULATION STATISTICS");
        println!("==========================================================");
        println!("host_seconds             {:.4} s", seconds);
        println!("sim_cycles               {}", self.cycles);
        println!("sim_insts                {}", self.instructions_retired);
        println!("sim_ipc                  {:.4}", self.ipc());
        println!("sim_cpi                  {:.4}", cyc / instr);
        println!("----------------------------------------------------------");
        println!("PIPELINE");
        for (name, n) in [
            ("stalls.memory", self.stalls_mem),
            ("stalls.control", self.stalls_control),
            ("stalls.data", self.stalls_data),
            ("stalls.fetch", self.stalls_fetch),
        ] {
            println!("  {:<22} {} ({:.2}%)", name, n, pct(n, cyc));
        }
        println!("  {:<22} {}", "traps", self.traps_taken);
        if let Some(trap) = &self.last_trap {
            println!(
                "  {:<22} {} at pc={:#010x} (cycle {})",
                "trap.last", trap.cause, trap.pc, trap.cycle
            );
        }
        println!("----------------------------------------------------------");
        println!("INSTRUCTION MIX");
        for (name, n) in [
            ("op.alu", self.inst_alu),
            ("op.load", self.inst_load),
            ("op.store", self.inst_store),
            ("op.branch", self.inst_branch),
            ("op.jump", self.inst_jump),
            ("op.system", self.inst_system),
        ] {
            println!("  {:<22} {} ({:.2}%)", name, n, pct(n, instr));
        }
        println!("----------------------------------------------------------");
        println!("BRANCH PREDICTION");
        let acc = if self.branch_predictions > 0 {
            100.0 - pct(self.branch_mispredictions, self.branch_predictions as f64)
        } else {
            0.0
        };
        println!("  bp.lookups             {}", self.branch_predictions);
        println!("  bp.mispredicts         {}", self.branch_mispredictions);
        println!("  bp.accuracy            {:.2}%", acc);
        println!("----------------------------------------------------------");
        println!("MEMORY HIERARCHY");
        for (name, c) in [("icache", &self.icache), ("dcache", &self.dcache)] {
            println!(
                "  {:<8} hits={:<10} misses={:<8} rate={:.2}% fills={} wb={} stall={}",
                name,
                c.hits,
                c.misses,
                c.hit_rate() * 100.0,
                c.fills,
                c.write_backs,
                c.stall_cycles
            );
        }
        if let Some(bc) = &self.bus_cache {
            println!(
                "  {:<8} rd_hit={} rd_miss={} wr_hit={} wr_miss={} fills={} flushes={} faults={}",
                "buscache",
                bc.read_hits,
                bc.read_misses,
                bc.write_hits,
                bc.write_misses,
                bc.fills,
                bc.flushes,
                bc.backing_faults
            );
        }
        println!(
            "  {:<8} txns={} beats={} errors={} wait={} busy={} grants={:?}",
            "bus",
            self.bus.transactions,
            self.bus.beats,
            self.bus.errors,
            self.bus.wait_cycles,
            self.bus.busy_cycles,
            self.bus.grants
        );
        println!("==========================================================");
    }
}
