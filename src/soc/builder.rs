//! System-on-Chip (SoC) Builder.
//!
//! This module defines the `System` structure, the container for everything
//! behind the CPU's bus ports: the bus itself, the bus cache and triple-bank
//! controller, and the peripheral slaves. It wires them from configuration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::common::{Clock, SimError};
use crate::config::Config;
use crate::soc::bus_cache::BusCache;
use crate::soc::devices::syscon::NO_EXIT;
use crate::soc::devices::{AuxMemory, SysCon};
use crate::soc::interconnect::Bus;
use crate::soc::memory::TripleBankController;

/// Bus master port of the instruction cache.
pub const ICACHE_MASTER: usize = 0;
/// Bus master port of the data cache.
pub const DCACHE_MASTER: usize = 1;

/// System-on-Chip (SoC) structure containing all bus-side components.
pub struct System {
    /// System interconnect bus.
    pub bus: Bus,
    /// Exit code written by the system controller (`NO_EXIT` until then).
    pub exit_request: Arc<AtomicU64>,
}

impl System {
    /// Creates a new system instance with the specified configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - System configuration (memory map, bus and cache geometry).
    ///
    /// # Returns
    ///
    /// The wired system, or an error if the slaves' windows overlap.
    pub fn new(config: &Config) -> Result<Self, SimError> {
        let masters = 2 + config.bus.extra_masters;
        let mut bus = Bus::new(masters);
        let exit_request = Arc::new(AtomicU64::new(NO_EXIT));

        let memory = TripleBankController::new(&config.memory);
        if config.bus_cache.enabled {
            bus.add_slave(Box::new(BusCache::new(&config.bus_cache, memory)))?;
        } else {
            bus.add_slave(Box::new(memory))?;
        }
        bus.add_slave(Box::new(SysCon::new(
            config.map.syscon_base,
            exit_request.clone(),
        )))?;
        if config.map.aux_size > 0 {
            bus.add_slave(Box::new(AuxMemory::new(
                config.map.aux_base,
                config.map.aux_size,
            )))?;
        }

        tracing::info!(
            "system: {} masters, backing store {:#x} bytes{}",
            masters,
            config.memory.total_size(),
            if config.bus_cache.enabled {
                " behind bus cache"
            } else {
                ""
            }
        );

        Ok(Self { bus, exit_request })
    }

    /// Loads a binary blob into memory at a specific address.
    ///
    /// # Arguments
    ///
    /// * `data` - The binary data to load
    /// * `addr` - The bus address to load the data at
    pub fn load_binary_at(&mut self, data: &[u8], addr: u32) -> Result<(), SimError> {
        self.bus.load_binary_at(data, addr)
    }

    /// Advances the bus and every slave by one cycle.
    ///
    /// A reset edge also withdraws any exit request not yet taken.
    pub fn tick(&mut self, clk: Clock) {
        if clk.reset {
            self.exit_request.store(NO_EXIT, Ordering::Relaxed);
        }
        self.bus.tick(clk);
    }

    /// Returns the exit code if software requested one.
    pub fn check_exit(&self) -> Option<u64> {
        match self.exit_request.load(Ordering::Relaxed) {
            NO_EXIT => None,
            code => Some(code),
        }
    }
}
