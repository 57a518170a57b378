//! Simulation harness: program loading and system bring-up.

/// Binary loading and `Cpu` construction.
pub mod loader;
