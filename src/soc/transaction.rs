//! Bus Transactions.
//!
//! A transaction is the unit of ownership on the bus: once a master is
//! granted, every beat of its transaction is transferred before any other
//! master is considered. Beats are 32-bit words at consecutive addresses.

use crate::common::BusError;

/// Identity of a bus master (index of its request port).
pub type MasterId = usize;

/// Transfer direction of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Slave to master.
    Read,
    /// Master to slave.
    Write,
}

/// A request presented by a master on its bus port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusTransaction {
    /// Issuing master.
    pub master: MasterId,
    /// Address of the first beat.
    pub addr: u32,
    /// Transfer direction.
    pub dir: Direction,
    /// Number of beats.
    pub burst_len: usize,
    /// Write data, one word per beat. Empty for reads.
    pub payload: Vec<u32>,
    /// Master-chosen sequence tag echoed in the response.
    pub seq: u64,
}

impl BusTransaction {
    /// Builds a read burst of `burst_len` words starting at `addr`.
    pub fn read(master: MasterId, addr: u32, burst_len: usize, seq: u64) -> Self {
        Self {
            master,
            addr,
            dir: Direction::Read,
            burst_len,
            payload: Vec::new(),
            seq,
        }
    }

    /// Builds a write burst carrying `payload` starting at `addr`.
    pub fn write(master: MasterId, addr: u32, payload: Vec<u32>, seq: u64) -> Self {
        Self {
            master,
            addr,
            dir: Direction::Write,
            burst_len: payload.len(),
            payload,
            seq,
        }
    }

    /// Address of beat `beat`.
    pub fn beat_addr(&self, beat: usize) -> u32 {
        self.addr.wrapping_add((beat as u32) * 4)
    }

    /// Address of the last byte touched by the burst, or `None` if the burst
    /// wraps the 32-bit address space.
    pub fn end_addr(&self) -> Option<u32> {
        let bytes = u32::try_from(self.burst_len.max(1) * 4).ok()?;
        self.addr.checked_add(bytes - 1)
    }
}

/// Completion of a transaction, delivered on the master's response port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusResponse {
    /// Master the response belongs to.
    pub master: MasterId,
    /// Sequence tag of the completed transaction.
    pub seq: u64,
    /// Address of the first beat.
    pub addr: u32,
    /// Direction of the completed transaction.
    pub dir: Direction,
    /// Read data (one word per completed beat).
    pub data: Vec<u32>,
    /// `Err` when the transaction ended with an error flag.
    pub result: Result<(), BusError>,
    /// Cycle the arbiter granted the transaction.
    pub granted_at: u64,
    /// Cycle the done/error handshake completed.
    pub completed_at: u64,
}

impl BusResponse {
    /// Returns `true` when the transaction completed without error.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
