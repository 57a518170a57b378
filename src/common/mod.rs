//! Common utilities and types used throughout the SoC simulator.
//!
//! This module provides the clock value threaded through every component,
//! memory access classification, and the error/trap types shared by the
//! pipeline, the caches and the bus.

/// Clock and reset signal passed to every component update.
pub mod clock;

/// Memory access type definitions.
pub mod data;

/// Error types and trap definitions.
pub mod error;

pub use clock::Clock;
pub use data::{AccessType, MemWidth};
pub use error::{BusError, SimError, Trap};
