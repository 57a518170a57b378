//! Trap Handling.
//!
//! Traps are taken when the faulting instruction reaches writeback. Entry
//! records the cause in the machine CSRs and returns the handler address.

use serde::Serialize;

use crate::common::error::Trap;
use crate::core::arch::csr::Csrs;

/// A trap taken by the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrapRecord {
    /// The exception.
    pub trap: Trap,
    /// Program counter of the faulting instruction.
    pub pc: u32,
    /// Cycle the trap was taken.
    pub cycle: u64,
}

/// Serializable form of a [`TrapRecord`].
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TrapSummary {
    /// Human-readable cause.
    pub cause: String,
    /// `mcause` code.
    pub code: u32,
    /// Faulting program counter.
    pub pc: u32,
    /// Cycle the trap was taken.
    pub cycle: u64,
}

impl From<&TrapRecord> for TrapSummary {
    fn from(record: &TrapRecord) -> Self {
        Self {
            cause: record.trap.to_string(),
            code: record.trap.cause(),
            pc: record.pc,
            cycle: record.cycle,
        }
    }
}

/// Trap entry helper.
pub struct TrapHandler;

impl TrapHandler {
    /// Enters the machine-mode handler for `trap` raised at `pc`.
    ///
    /// # Arguments
    ///
    /// * `csrs` - CSR file receiving `mepc`, `mcause` and `mtval`.
    /// * `trap` - The exception being taken.
    /// * `pc` - Program counter of the faulting instruction.
    /// * `vector` - Handler address.
    ///
    /// # Returns
    ///
    /// The program counter to resume fetching at.
    pub fn enter(csrs: &mut Csrs, trap: Trap, pc: u32, vector: u32) -> u32 {
        csrs.mepc = pc;
        csrs.mcause = trap.cause();
        csrs.mtval = trap.tval();
        vector
    }
}
