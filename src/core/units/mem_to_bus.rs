//! Cache-to-Bus Bridge.
//!
//! The bridge turns line requests from the first-level caches into bus
//! transactions. A request of N words becomes `ceil(N / max_burst)` bursts
//! issued back to back on the cache's own master port; the request completes
//! only when every burst has completed. Requests from one cache complete in
//! issue order; the two caches never share a port, so the bridge neither
//! reorders nor merges their traffic.

use std::collections::VecDeque;

use crate::common::{BusError, Clock};
use crate::soc::interconnect::Bus;
use crate::soc::transaction::{BusResponse, BusTransaction, MasterId};
use crate::soc::{DCACHE_MASTER, ICACHE_MASTER};

/// Line operation requested by a cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineOp {
    /// Read a whole line.
    Fill,
    /// Write a whole line.
    WriteBack,
}

/// Request from a cache to the bridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineRequest {
    /// Operation.
    pub op: LineOp,
    /// Line-aligned address.
    pub addr: u32,
    /// Line size in words.
    pub words: usize,
    /// Write data (`words` entries) for write-backs.
    pub data: Vec<u32>,
}

impl LineRequest {
    /// A fill of `words` words at `addr`.
    pub fn fill(addr: u32, words: usize) -> Self {
        Self {
            op: LineOp::Fill,
            addr,
            words,
            data: Vec::new(),
        }
    }

    /// A write-back of `data` to `addr`.
    pub fn write_back(addr: u32, data: Vec<u32>) -> Self {
        Self {
            op: LineOp::WriteBack,
            addr,
            words: data.len(),
            data,
        }
    }
}

/// Completion reported back to a cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineResponse {
    /// Operation that completed.
    pub op: LineOp,
    /// Line address.
    pub addr: u32,
    /// Fill data (empty for write-backs and failed fills).
    pub data: Vec<u32>,
    /// First error reported by any constituent transaction.
    pub result: Result<(), BusError>,
}

/// Cache side of the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgePort {
    /// Instruction cache.
    Instruction,
    /// Data cache.
    Data,
}

impl BridgePort {
    /// Bus master port used by this side.
    pub fn master(self) -> MasterId {
        match self {
            BridgePort::Instruction => ICACHE_MASTER,
            BridgePort::Data => DCACHE_MASTER,
        }
    }

    fn index(self) -> usize {
        match self {
            BridgePort::Instruction => 0,
            BridgePort::Data => 1,
        }
    }
}

/// A line request being carried by one or more bus transactions.
struct Pending {
    req: LineRequest,
    issued: bool,
    /// (sequence tag, word offset) of bursts not yet completed, in issue order.
    bursts: VecDeque<(u64, usize)>,
    data: Vec<u32>,
    error: Option<BusError>,
}

/// Per-cache request and completion queues.
#[derive(Default)]
struct PortState {
    pending: VecDeque<Pending>,
    completions: VecDeque<LineResponse>,
}

/// Bridge statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Line requests accepted.
    pub requests: u64,
    /// Bus transactions issued.
    pub transactions: u64,
}

/// Bridge between the first-level caches and the system bus.
pub struct MemToBus {
    ports: [PortState; 2],
    max_burst: usize,
    next_seq: u64,
    /// Activity counters.
    pub stats: BridgeStats,
}

impl MemToBus {
    /// Creates a bridge issuing bursts of at most `max_burst` words.
    pub fn new(max_burst: usize) -> Self {
        Self {
            ports: [PortState::default(), PortState::default()],
            max_burst: max_burst.max(1),
            next_seq: 0,
            stats: BridgeStats::default(),
        }
    }

    /// Queues a line request from `port`.
    ///
    /// It is turned into bus transactions on the next [`MemToBus::tick`].
    pub fn issue(&mut self, port: BridgePort, req: LineRequest) {
        tracing::debug!("bridge: {:?} {:?} {:#010x} x{}", port, req.op, req.addr, req.words);
        self.stats.requests += 1;
        self.ports[port.index()].pending.push_back(Pending {
            data: Vec::with_capacity(req.words),
            req,
            issued: false,
            bursts: VecDeque::new(),
            error: None,
        });
    }

    /// Pops the oldest completion for `port`.
    pub fn take_completion(&mut self, port: BridgePort) -> Option<LineResponse> {
        self.ports[port.index()].completions.pop_front()
    }

    /// Line requests from `port` not yet completed.
    pub fn outstanding(&self, port: BridgePort) -> usize {
        self.ports[port.index()].pending.len()
    }

    /// Returns `true` when neither port has work in flight or unread.
    pub fn is_idle(&self) -> bool {
        self.ports
            .iter()
            .all(|p| p.pending.is_empty() && p.completions.is_empty())
    }

    /// Issues new bursts and collects bus responses.
    ///
    /// # Arguments
    ///
    /// * `clk` - Current clock; reset drops all in-flight state.
    /// * `bus` - The bus the caches' master ports are attached to.
    pub fn tick(&mut self, clk: Clock, bus: &mut Bus) {
        if clk.reset {
            for port in &mut self.ports {
                port.pending.clear();
                port.completions.clear();
            }
            return;
        }

        for port in [BridgePort::Instruction, BridgePort::Data] {
            while let Some(resp) = bus.take_response(port.master()) {
                self.accept(port, resp);
            }
            self.retire(port);
            self.issue_bursts(port, bus);
        }
    }

    fn issue_bursts(&mut self, port: BridgePort, bus: &mut Bus) {
        let master = port.master();
        let max_burst = self.max_burst;
        let state = &mut self.ports[port.index()];

        for pending in state.pending.iter_mut().filter(|p| !p.issued) {
            let mut offset = 0;
            while offset < pending.req.words {
                let len = max_burst.min(pending.req.words - offset);
                let addr = pending.req.addr.wrapping_add(offset as u32 * 4);
                let seq = self.next_seq;
                self.next_seq = self.next_seq.wrapping_add(1);

                let txn = match pending.req.op {
                    LineOp::Fill => BusTransaction::read(master, addr, len, seq),
                    LineOp::WriteBack => BusTransaction::write(
                        master,
                        addr,
                        pending.req.data[offset..offset + len].to_vec(),
                        seq,
                    ),
                };
                bus.submit(txn);
                self.stats.transactions += 1;
                pending.bursts.push_back((seq, offset));
                offset += len;
            }
            pending.issued = true;
        }
    }

    fn accept(&mut self, port: BridgePort, resp: BusResponse) {
        let state = &mut self.ports[port.index()];
        let Some(pending) = state
            .pending
            .iter_mut()
            .find(|p| p.bursts.front().is_some_and(|(seq, _)| *seq == resp.seq))
        else {
            tracing::warn!("bridge: unexpected response seq {} on {:?}", resp.seq, port);
            return;
        };
        pending.bursts.pop_front();
        match resp.result {
            Ok(()) => pending.data.extend_from_slice(&resp.data),
            Err(err) => {
                pending.error.get_or_insert(err);
            }
        }
    }

    fn retire(&mut self, port: BridgePort) {
        let state = &mut self.ports[port.index()];
        while state
            .pending
            .front()
            .is_some_and(|p| p.issued && p.bursts.is_empty())
        {
            let Some(done) = state.pending.pop_front() else {
                break;
            };
            let result = match done.error {
                Some(err) => Err(err),
                None => Ok(()),
            };
            let data = match (done.req.op, result) {
                (LineOp::Fill, Ok(())) => done.data,
                _ => Vec::new(),
            };
            state.completions.push_back(LineResponse {
                op: done.req.op,
                addr: done.req.addr,
                data,
                result,
            });
        }
    }
}
