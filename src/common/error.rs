//! Trap and Error definitions.
//!
//! This module defines the error handling and trap mechanisms for the simulator:
//! 1. **Bus errors:** Raised by the interconnect or a slave and carried back to
//!    the requester as the error flag of a transaction.
//! 2. **Traps:** Synchronous exceptions taken by the pipeline at writeback.
//! 3. **Simulator errors:** Host-side failures (I/O, configuration, loading).

use thiserror::Error;

/// Failure reported on a bus transaction.
///
/// Bus errors are never retried by the fabric. The requester receives the
/// error and decides what to do; for the CPU this ends in an access-fault trap.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BusError {
    /// No slave decodes the address (or the burst runs past the end of the
    /// slave window).
    #[error("unmapped bus address {0:#010x}")]
    Unmapped(u32),

    /// The addressed slave refused the beat.
    #[error("slave fault at {0:#010x}")]
    SlaveFault(u32),

    /// The striped backing store could not complete the access.
    #[error("backing store fault at {0:#010x}")]
    BackingStoreFault(u32),
}

impl BusError {
    /// Address the error was reported for.
    pub fn addr(&self) -> u32 {
        match *self {
            BusError::Unmapped(a) | BusError::SlaveFault(a) | BusError::BackingStoreFault(a) => a,
        }
    }
}

/// RISC-V synchronous exceptions raised by the pipeline.
///
/// The associated values follow `mtval` conventions: the faulting address
/// for access and alignment faults, the instruction bits for illegal
/// instructions and the program counter for breakpoints.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Trap {
    /// Fetch from a program counter that is not word aligned.
    #[error("instruction address misaligned ({0:#010x})")]
    InstructionAddressMisaligned(u32),

    /// The instruction fill failed on the bus.
    #[error("instruction access fault ({0:#010x})")]
    InstructionAccessFault(u32),

    /// The instruction could not be decoded.
    #[error("illegal instruction ({0:#010x})")]
    IllegalInstruction(u32),

    /// `ebreak`.
    #[error("breakpoint ({0:#010x})")]
    Breakpoint(u32),

    /// Load from an address not aligned to the access width.
    #[error("load address misaligned ({0:#010x})")]
    LoadAddressMisaligned(u32),

    /// The load's line fill failed on the bus.
    #[error("load access fault ({0:#010x})")]
    LoadAccessFault(u32),

    /// Store to an address not aligned to the access width.
    #[error("store address misaligned ({0:#010x})")]
    StoreAddressMisaligned(u32),

    /// The store's allocating fill failed on the bus.
    #[error("store access fault ({0:#010x})")]
    StoreAccessFault(u32),

    /// `ecall` executed in machine mode.
    #[error("environment call")]
    EnvironmentCall,
}

impl Trap {
    /// Exception code written to `mcause`.
    pub fn cause(&self) -> u32 {
        match self {
            Trap::InstructionAddressMisaligned(_) => 0,
            Trap::InstructionAccessFault(_) => 1,
            Trap::IllegalInstruction(_) => 2,
            Trap::Breakpoint(_) => 3,
            Trap::LoadAddressMisaligned(_) => 4,
            Trap::LoadAccessFault(_) => 5,
            Trap::StoreAddressMisaligned(_) => 6,
            Trap::StoreAccessFault(_) => 7,
            Trap::EnvironmentCall => 11,
        }
    }

    /// Value written to `mtval`.
    pub fn tval(&self) -> u32 {
        match *self {
            Trap::InstructionAddressMisaligned(v)
            | Trap::InstructionAccessFault(v)
            | Trap::IllegalInstruction(v)
            | Trap::Breakpoint(v)
            | Trap::LoadAddressMisaligned(v)
            | Trap::LoadAccessFault(v)
            | Trap::StoreAddressMisaligned(v)
            | Trap::StoreAccessFault(v) => v,
            Trap::EnvironmentCall => 0,
        }
    }
}

/// Host-side simulator failure.
#[derive(Debug, Error)]
pub enum SimError {
    /// Reading a configuration file or program image failed.
    #[error("could not read '{path}': {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for `Config`.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The configuration parsed but describes an impossible system.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The program does not fit in the slave it is loaded into.
    #[error("program of {size} bytes does not fit at {addr:#010x}")]
    ProgramTooLarge {
        /// Load address.
        addr: u32,
        /// Program size in bytes.
        size: usize,
    },

    /// Writing the statistics report failed.
    #[error("could not write statistics: {0}")]
    Stats(#[from] serde_json::Error),
}
