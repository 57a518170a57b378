//! Global Clock.
//!
//! Every block in the SoC is a synchronous state machine. Rather than relying
//! on ambient global state, the current cycle number and the reset line are
//! carried in a small `Clock` value and passed explicitly to each `tick`.

/// Snapshot of the shared clock for one rising edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Clock {
    /// Number of edges elapsed since power-on.
    pub cycle: u64,
    /// Synchronous reset. Components return to their power-on state when set.
    pub reset: bool,
}

impl Clock {
    /// Creates a clock positioned at `cycle` with reset deasserted.
    pub fn at(cycle: u64) -> Self {
        Self {
            cycle,
            reset: false,
        }
    }

    /// Returns the clock for the following edge.
    pub fn next(self) -> Self {
        Self {
            cycle: self.cycle + 1,
            reset: false,
        }
    }
}
