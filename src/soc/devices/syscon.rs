//! System Controller.
//!
//! A single control register at the base of the window. Software writes an
//! exit request there; the simulator polls the shared signal after every
//! edge. The store travels through the data cache like any other, so
//! firmware follows it with `fence.i` to push the line onto the bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::common::Clock;
use crate::soc::traits::{BeatResult, BusSlave};
use crate::soc::transaction::{BusTransaction, Direction};

/// Value written to request a clean power-off.
pub const POWEROFF: u32 = 0x5555;
/// Value written to request a reset (treated as a clean exit).
pub const RESET: u32 = 0x7777;
/// Low half-word written to report failure; the high half-word is the code.
pub const FAIL: u32 = 0x3333;

/// No exit requested yet.
pub const NO_EXIT: u64 = u64::MAX;

/// SysCon (System Controller)
/// Handles power-off and failure signalling from software.
/// Follows the SiFive test device register layout.
pub struct SysCon {
    base_addr: u32,
    exit_signal: Arc<AtomicU64>,
}

impl SysCon {
    /// Creates the controller at `base_addr`.
    ///
    /// `exit_signal` holds `NO_EXIT` until software requests an exit, then
    /// the requested exit code.
    pub fn new(base_addr: u32, exit_signal: Arc<AtomicU64>) -> Self {
        Self {
            base_addr,
            exit_signal,
        }
    }

    fn write_control(&mut self, val: u32) {
        match val & 0xffff {
            POWEROFF => {
                tracing::info!("syscon: poweroff signal received");
                self.exit_signal.store(0, Ordering::Relaxed);
            }
            RESET => {
                tracing::info!("syscon: reset signal received (simulated as exit)");
                self.exit_signal.store(0, Ordering::Relaxed);
            }
            FAIL => {
                let code = u64::from(val >> 16).max(1);
                tracing::info!("syscon: failure signal received (code {})", code);
                self.exit_signal.store(code, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}

impl BusSlave for SysCon {
    fn name(&self) -> &str {
        "SysCon"
    }

    fn address_range(&self) -> (u32, u32) {
        (self.base_addr, 0x1000)
    }

    fn transfer(&mut self, txn: &BusTransaction, beat: usize, _clk: Clock) -> BeatResult {
        match txn.dir {
            Direction::Read => BeatResult::Read(0),
            Direction::Write => {
                // Register 0: system control
                if txn.beat_addr(beat) == self.base_addr {
                    self.write_control(txn.payload.get(beat).copied().unwrap_or(0));
                }
                BeatResult::Written
            }
        }
    }
}
