//! System Bus Interconnect.
//!
//! This module implements the shared system bus. Masters queue transactions
//! on their own request port, a round-robin [`Arbiter`] hands out ownership
//! one transaction at a time, and the owner's beats are driven into the
//! decoded slave until the transaction completes or errors. Responses are
//! queued on the master's response port in completion order.
//!
//! The bus never retries an error: unmapped addresses, bursts that run past
//! the end of a slave window, and slave faults all end the transaction with
//! an error response.

use std::collections::VecDeque;

use serde::Serialize;

use crate::common::{BusError, Clock, SimError};
use crate::soc::arbiter::Arbiter;
use crate::soc::bus_cache::BusCache;
use crate::soc::traits::{BeatResult, BusSlave};
use crate::soc::transaction::{BusResponse, BusTransaction, Direction, MasterId};

/// Bus activity counters.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct BusStats {
    /// Completed transactions (including errored ones).
    pub transactions: u64,
    /// Beats accepted by slaves.
    pub beats: u64,
    /// Transactions that ended with an error response.
    pub errors: u64,
    /// Cycles a presented beat was answered with `Wait`.
    pub wait_cycles: u64,
    /// Cycles the bus was owned.
    pub busy_cycles: u64,
    /// Grants per master port.
    pub grants: Vec<u64>,
}

/// The transaction currently owning the bus.
struct ActiveTransfer {
    txn: BusTransaction,
    slave: usize,
    beat: usize,
    data: Vec<u32>,
    granted_at: u64,
}

/// System interconnect bus.
///
/// Routes transactions from master ports to the slave whose address window
/// contains them. Exactly one transaction is active at a time.
pub struct Bus {
    slaves: Vec<Box<dyn BusSlave>>,
    arbiter: Arbiter,
    requests: Vec<VecDeque<BusTransaction>>,
    responses: Vec<VecDeque<BusResponse>>,
    active: Option<ActiveTransfer>,
    /// Activity counters.
    pub stats: BusStats,
}

impl Bus {
    /// Creates a bus with `masters` request/response ports and no slaves.
    pub fn new(masters: usize) -> Self {
        Self {
            slaves: Vec::new(),
            arbiter: Arbiter::new(masters),
            requests: (0..masters).map(|_| VecDeque::new()).collect(),
            responses: (0..masters).map(|_| VecDeque::new()).collect(),
            active: None,
            stats: BusStats {
                grants: vec![0; masters],
                ..BusStats::default()
            },
        }
    }

    /// Number of master ports.
    pub fn masters(&self) -> usize {
        self.requests.len()
    }

    /// Attaches a slave to the bus.
    ///
    /// Slaves are kept sorted by base address.
    ///
    /// # Arguments
    ///
    /// * `slave` - The slave to attach.
    ///
    /// # Returns
    ///
    /// An error if the slave's window is empty or overlaps an attached slave.
    pub fn add_slave(&mut self, slave: Box<dyn BusSlave>) -> Result<(), SimError> {
        let (base, size) = slave.address_range();
        let end = u64::from(base) + u64::from(size);
        if size == 0 || end > 1 << 32 {
            return Err(SimError::InvalidConfig(format!(
                "slave {} has an invalid window {:#010x}+{:#x}",
                slave.name(),
                base,
                size
            )));
        }
        for other in &self.slaves {
            let (obase, osize) = other.address_range();
            let oend = u64::from(obase) + u64::from(osize);
            if u64::from(base) < oend && u64::from(obase) < end {
                return Err(SimError::InvalidConfig(format!(
                    "slave {} overlaps {}",
                    slave.name(),
                    other.name()
                )));
            }
        }
        tracing::info!(
            "bus: registered slave {:<12} @ {:#010x} - {:#010x} ({} bytes)",
            slave.name(),
            base,
            end,
            size
        );
        self.slaves.push(slave);
        self.slaves.sort_by_key(|s| s.address_range().0);
        Ok(())
    }

    /// Queues a transaction on its master's request port.
    ///
    /// Transactions from one master are granted in submission order.
    pub fn submit(&mut self, txn: BusTransaction) {
        let master = txn.master;
        let Some(queue) = self.requests.get_mut(master) else {
            tracing::warn!("bus: dropping transaction from unknown master {}", master);
            return;
        };
        queue.push_back(txn);
        self.arbiter.request(master);
    }

    /// Pops the oldest response waiting on `master`'s response port.
    pub fn take_response(&mut self, master: MasterId) -> Option<BusResponse> {
        self.responses.get_mut(master)?.pop_front()
    }

    /// Number of transactions queued or active for `master`.
    pub fn outstanding(&self, master: MasterId) -> usize {
        let queued = self.requests.get(master).map_or(0, VecDeque::len);
        let active = self
            .active
            .as_ref()
            .map_or(0, |a| usize::from(a.txn.master == master));
        queued + active
    }

    /// Returns `true` while a transaction owns the bus.
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Master currently owning the bus.
    pub fn owner(&self) -> Option<MasterId> {
        self.arbiter.owner()
    }

    /// Finds the slave whose window contains `addr`.
    fn decode(&self, addr: u32) -> Option<usize> {
        self.slaves.iter().position(|s| {
            let (base, size) = s.address_range();
            addr >= base && u64::from(addr) < u64::from(base) + u64::from(size)
        })
    }

    /// Checks that the whole burst lies inside the decoded slave.
    fn route(&self, txn: &BusTransaction) -> Result<usize, BusError> {
        let idx = self.decode(txn.addr).ok_or(BusError::Unmapped(txn.addr))?;
        let (base, size) = self.slaves[idx].address_range();
        let window_end = u64::from(base) + u64::from(size);
        match txn.end_addr() {
            Some(last) if u64::from(last) < window_end => Ok(idx),
            _ => Err(BusError::Unmapped(txn.addr)),
        }
    }

    /// Advances the bus by one clock cycle.
    ///
    /// Ticks every slave, grants the bus if it is free, then drives one beat
    /// of the active transaction. Under reset the slaves see the reset edge
    /// and the bus drops all queued and active transactions.
    pub fn tick(&mut self, clk: Clock) {
        for slave in self.slaves.iter_mut() {
            slave.tick(clk);
        }

        if clk.reset {
            self.reset();
            return;
        }

        if self.active.is_none() {
            self.start_next(clk);
        }

        self.drive_beat(clk);
    }

    fn start_next(&mut self, clk: Clock) {
        let Some(master) = self.arbiter.grant() else {
            return;
        };
        let Some(txn) = self.requests[master].pop_front() else {
            self.arbiter.release(master);
            return;
        };
        self.stats.grants[master] += 1;
        tracing::debug!(
            "bus: grant master {} {:?} {:#010x} x{} (seq {})",
            master,
            txn.dir,
            txn.addr,
            txn.burst_len,
            txn.seq
        );

        match self.route(&txn) {
            Ok(slave) => {
                self.active = Some(ActiveTransfer {
                    txn,
                    slave,
                    beat: 0,
                    data: Vec::new(),
                    granted_at: clk.cycle,
                });
            }
            Err(err) => {
                let active = ActiveTransfer {
                    txn,
                    slave: 0,
                    beat: 0,
                    data: Vec::new(),
                    granted_at: clk.cycle,
                };
                self.complete(active, Err(err), clk);
            }
        }
    }

    fn drive_beat(&mut self, clk: Clock) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        self.stats.busy_cycles += 1;

        if active.beat >= active.txn.burst_len {
            self.complete(active, Ok(()), clk);
            return;
        }

        let slave = &mut self.slaves[active.slave];
        match slave.transfer(&active.txn, active.beat, clk) {
            BeatResult::Wait => {
                self.stats.wait_cycles += 1;
                self.active = Some(active);
            }
            BeatResult::Read(word) => {
                self.stats.beats += 1;
                if active.txn.dir == Direction::Read {
                    active.data.push(word);
                }
                self.finish_beat(active, clk);
            }
            BeatResult::Written => {
                self.stats.beats += 1;
                self.finish_beat(active, clk);
            }
            BeatResult::Error(err) => self.complete(active, Err(err), clk),
        }
    }

    fn finish_beat(&mut self, mut active: ActiveTransfer, clk: Clock) {
        active.beat += 1;
        if active.beat == active.txn.burst_len {
            self.complete(active, Ok(()), clk);
        } else {
            self.active = Some(active);
        }
    }

    fn complete(&mut self, active: ActiveTransfer, result: Result<(), BusError>, clk: Clock) {
        let master = active.txn.master;
        self.stats.transactions += 1;
        if let Err(err) = result {
            self.stats.errors += 1;
            tracing::debug!("bus: master {} transaction failed: {}", master, err);
        }

        self.responses[master].push_back(BusResponse {
            master,
            seq: active.txn.seq,
            addr: active.txn.addr,
            dir: active.txn.dir,
            data: active.data,
            result,
            granted_at: active.granted_at,
            completed_at: clk.cycle,
        });

        self.arbiter.release(master);
        if !self.requests[master].is_empty() {
            self.arbiter.request(master);
        }
    }

    /// Drops every queued and active transaction.
    pub fn reset(&mut self) {
        self.arbiter.reset();
        self.active = None;
        self.requests.iter_mut().for_each(VecDeque::clear);
        self.responses.iter_mut().for_each(VecDeque::clear);
    }

    /// Loads a binary blob into the slave mapped at `addr` (backdoor).
    ///
    /// # Arguments
    ///
    /// * `data` - The binary data to load.
    /// * `addr` - The bus address to load the data at.
    pub fn load_binary_at(&mut self, data: &[u8], addr: u32) -> Result<(), SimError> {
        let too_large = SimError::ProgramTooLarge {
            addr,
            size: data.len(),
        };
        let Some(idx) = self.decode(addr) else {
            return Err(too_large);
        };
        let slave = &mut self.slaves[idx];
        let (base, size) = slave.address_range();
        let offset = addr - base;
        if u64::from(offset) + data.len() as u64 > u64::from(size) || !slave.load(offset, data) {
            return Err(too_large);
        }
        tracing::info!("loader: wrote {} bytes to {:#010x} ({})", data.len(), addr, slave.name());
        Ok(())
    }

    /// Reads the word at `addr` through the slave backdoor.
    pub fn peek_u32(&self, addr: u32) -> Option<u32> {
        let slave = &self.slaves[self.decode(addr)?];
        let (base, _) = slave.address_range();
        slave.peek(addr - base)
    }

    /// The bus cache, if one is attached.
    pub fn bus_cache(&self) -> Option<&BusCache> {
        self.slaves.iter().find_map(|s| s.as_bus_cache())
    }

    /// Mutable access to the attached bus cache.
    pub fn bus_cache_mut(&mut self) -> Option<&mut BusCache> {
        self.slaves.iter_mut().find_map(|s| s.as_bus_cache_mut())
    }
}
