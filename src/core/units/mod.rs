//! Execution units.
//!
//! The integer ALU, the branch unit, the first-level caches and the bridge
//! that connects them to the system bus.

/// Integer ALU.
pub mod alu;
/// Branch resolution and static prediction.
pub mod bru;
/// First-level caches.
pub mod cache;
/// Cache-to-bus bridge.
pub mod mem_to_bus;
