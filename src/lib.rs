//! RV32 System-on-Chip Simulator Library.
//!
//! This crate implements a cycle-level simulator of a small RISC-V 32-bit
//! system-on-chip: an in-order five-stage RV32IM core with first-level
//! instruction and data caches, a bridge onto a shared round-robin bus, a
//! bus cache, and a striped triple-bank serial backing store.
//!
//! # Architecture
//!
//! * **Core**: 5-stage in-order pipeline (Fetch, Decode, Execute, Memory, Writeback)
//!   with forwarding, static branch prediction and precise machine-mode traps.
//! * **Memory**: read-only instruction cache, write-back data cache, bus cache
//!   and the triple-bank controller.
//! * **Peripherals**: system controller (exit/poweroff) and an auxiliary scratch memory.
//!
//! # Modules
//!
//! * `common`: Clock, access types and error handling.
//! * `config`: Configuration loading and parsing.
//! * `core`: CPU core implementation.
//! * `isa`: Instruction Set Architecture definitions.
//! * `sim`: Simulation harness and loaders.
//! * `soc`: System-on-Chip component implementations.
//! * `stats`: Performance statistics collection.

/// Shared types, error handling and the clock.
pub mod common;

/// Configuration system for the pipeline, caches, bus and memory.
///
/// Loads and parses TOML configuration files to customize simulator behavior
/// for different simulation scenarios and hardware configurations.
pub mod config;

/// CPU core implementation including pipeline stages and execution units.
pub mod core;

/// Instruction Set Architecture definitions, decoder and encoder.
pub mod isa;

/// Simulation harness and binary loaders.
pub mod sim;

/// System-on-Chip components: bus, arbiter, bus cache, memory controller
/// and peripherals.
pub mod soc;

/// Performance statistics collection and reporting.
///
/// Tracks cycle counts, instruction counts, cache statistics, and other
/// performance metrics during simulation execution.
pub mod stats;
