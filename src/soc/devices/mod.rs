//! Peripheral Bus Slaves.
//!
//! 1. **SysCon:** power-off / failure register used to end a run.
//! 2. **AuxMemory:** single-cycle scratch SRAM.

/// Auxiliary scratch memory.
pub mod aux_memory;
/// System controller.
pub mod syscon;

pub use aux_memory::AuxMemory;
pub use syscon::SysCon;
