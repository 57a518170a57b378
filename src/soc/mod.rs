//! System-on-Chip.
//!
//! Everything on the far side of the CPU's bus ports: the interconnect and
//! its arbiter, the bus cache, the striped backing store and peripherals.

/// Round-robin arbiter.
pub mod arbiter;
/// System builder.
pub mod builder;
/// Second-level bus cache.
pub mod bus_cache;
/// Peripheral slaves.
pub mod devices;
/// Bus interconnect.
pub mod interconnect;
/// Backing store controller.
pub mod memory;
/// Slave interface.
pub mod traits;
/// Transaction records.
pub mod transaction;

pub use builder::{System, DCACHE_MASTER, ICACHE_MASTER};
pub use interconnect::Bus;
pub use traits::{BeatResult, BusSlave};
pub use transaction::{BusResponse, BusTransaction, Direction, MasterId};
