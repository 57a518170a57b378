//! CPU core: architectural state, the five-stage pipeline and the
//! execution and cache units it drives.

/// Architectural state (registers, CSRs, trap entry).
pub mod arch;

/// The `Cpu` and its tick.
pub mod cpu;

/// Pipeline latches, hazards and stages.
pub mod pipeline;

/// Execution units, caches and the bus bridge.
pub mod units;

pub use cpu::{Cpu, RunOutcome};
