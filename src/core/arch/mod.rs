//! RISC-V architectural state.
//!
//! Register file, machine CSRs and trap entry.

/// Control and Status Register definitions and access logic.
pub mod csr;

/// General-Purpose Register file implementation.
pub mod gpr;

/// Trap entry and trap records.
pub mod trap;
