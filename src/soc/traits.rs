//! System-on-Chip Traits.
//!
//! This module defines the interface every bus slave implements. The bus
//! drives one beat at a time: it keeps presenting the same beat (valid)
//! until the slave answers with something other than `Wait` (ready).

use crate::common::{BusError, Clock};
use crate::soc::bus_cache::BusCache;
use crate::soc::transaction::BusTransaction;

/// Slave answer to the beat currently presented by the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BeatResult {
    /// Not ready; the bus presents the same beat again next cycle.
    Wait,
    /// Read beat accepted, carrying its data.
    Read(u32),
    /// Write beat accepted.
    Written,
    /// The beat failed; the transaction ends with this error.
    Error(BusError),
}

/// Trait for slaves attached to the system bus.
pub trait BusSlave {
    /// Returns the user-friendly name of the slave.
    ///
    /// Used for debugging and logging purposes.
    fn name(&self) -> &str;

    /// Returns the address window (Base Address, Size in bytes) of the slave.
    ///
    /// Used by the bus address decoder.
    fn address_range(&self) -> (u32, u32);

    /// Handles beat `beat` of `txn`.
    ///
    /// Called once per cycle while the beat is outstanding. The slave sees
    /// the whole transaction so it can plan ahead, but must only commit the
    /// beat it is answering.
    fn transfer(&mut self, txn: &BusTransaction, beat: usize, clk: Clock) -> BeatResult;

    /// Advances slave-internal state by one clock cycle.
    ///
    /// Called every cycle whether or not the slave is addressed.
    fn tick(&mut self, _clk: Clock) {}

    /// Backdoor write used by the loader; bypasses timing.
    ///
    /// Returns `false` if the slave has no storage to load into.
    fn load(&mut self, _offset: u32, _data: &[u8]) -> bool {
        false
    }

    /// Backdoor read of the word at `offset` (coherent view, no timing).
    fn peek(&self, _offset: u32) -> Option<u32> {
        None
    }

    /// Downcasts the slave to the bus cache if applicable.
    ///
    /// Used to report bus cache statistics.
    fn as_bus_cache(&self) -> Option<&BusCache> {
        None
    }

    /// Mutable variant of [`BusSlave::as_bus_cache`].
    fn as_bus_cache_mut(&mut self) -> Option<&mut BusCache> {
        None
    }
}
