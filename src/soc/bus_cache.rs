//! Bus Cache.
//!
//! A second-level cache shared by every bus master, sitting between the bus
//! and the triple-bank controller. It is indexed by bus address and answers
//! beats directly:
//!
//! 1. **Read hit:** data is returned in the same cycle.
//! 2. **Miss:** the slot is allocated (flushing a dirty victim first), a
//!    line read is queued on the controller, and the beat waits.
//! 3. **Write hit:** the word is updated and the line becomes dirty. Under
//!    write-through the line is flushed once the transaction leaves it.
//!
//! Every line carries its own state. A line that is not `Idle` has a
//! controller operation in flight and blocks all beats that address it, so
//! same-line accesses are served strictly in bus grant order and no two
//! backing-store operations ever target the same line at once.

use std::collections::VecDeque;

use serde::Serialize;

use crate::common::{BusError, Clock};
use crate::config::{BusCacheConfig, WritePolicy};
use crate::core::units::cache::policies::{LruPolicy, ReplacementPolicy};
use crate::core::units::cache::CacheGeometry;
use crate::soc::memory::{MemRequest, TripleBankController};
use crate::soc::traits::{BeatResult, BusSlave};
use crate::soc::transaction::{BusTransaction, Direction};

/// Per-line controller state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineState {
    /// Line is stable.
    #[default]
    Idle,
    /// A read miss is filling the line.
    ReadPending,
    /// A write miss is filling the line before the write merges.
    WritePending,
    /// Dirty data is being written to the controller.
    FlushPending,
}

/// A bus cache line.
#[derive(Clone, Debug)]
pub struct BusCacheLine {
    /// Address tag (also set while a fill is pending).
    pub tag: u32,
    /// Line holds valid data.
    pub valid: bool,
    /// Line differs from the backing store.
    pub dirty: bool,
    /// Controller state.
    pub state: LineState,
    /// Line payload.
    pub data: Vec<u32>,
}

/// Bus cache statistics.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct BusCacheStats {
    /// Read beats served from a resident line.
    pub read_hits: u64,
    /// Read beats that allocated a line.
    pub read_misses: u64,
    /// Write beats merged into a resident line.
    pub write_hits: u64,
    /// Write beats that allocated a line.
    pub write_misses: u64,
    /// Lines written to the controller.
    pub flushes: u64,
    /// Lines read from the controller.
    pub fills: u64,
    /// Controller operations that faulted.
    pub backing_faults: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpKind {
    Fill,
    Flush,
}

#[derive(Clone, Copy, Debug)]
struct BackingOp {
    slot: usize,
    kind: OpKind,
    line_addr: u32,
}

/// Second-level cache in front of the triple-bank controller.
pub struct BusCache {
    geometry: CacheGeometry,
    lines: Vec<BusCacheLine>,
    policy: LruPolicy,
    write_policy: WritePolicy,
    memory: TripleBankController,
    ops: VecDeque<BackingOp>,
    in_flight: Option<BackingOp>,
    faults: Vec<(u32, BusError)>,
    /// Activity counters.
    pub stats: BusCacheStats,
}

impl BusCache {
    /// Wraps `memory` with a cache configured by `config`.
    pub fn new(config: &BusCacheConfig, memory: TripleBankController) -> Self {
        let geometry = CacheGeometry::new(config.size_bytes, config.line_bytes, config.ways);
        let lines = (0..geometry.sets * geometry.ways)
            .map(|_| BusCacheLine {
                tag: 0,
                valid: false,
                dirty: false,
                state: LineState::Idle,
                data: vec![0; geometry.line_words],
            })
            .collect();
        Self {
            policy: LruPolicy::new(geometry.sets, geometry.ways),
            geometry,
            lines,
            write_policy: config.write_policy,
            memory,
            ops: VecDeque::new(),
            in_flight: None,
            faults: Vec::new(),
            stats: BusCacheStats::default(),
        }
    }

    /// Cache geometry.
    pub fn geometry(&self) -> CacheGeometry {
        self.geometry
    }

    /// The controller behind the cache.
    pub fn memory(&self) -> &TripleBankController {
        &self.memory
    }

    /// Line holding `addr` (resident or being filled), if any.
    pub fn line_for(&self, addr: u32) -> Option<&BusCacheLine> {
        self.lookup(addr).map(|idx| &self.lines[idx])
    }

    /// Returns `true` when no controller operation is queued or in flight.
    pub fn is_quiescent(&self) -> bool {
        self.ops.is_empty() && self.in_flight.is_none()
    }

    /// Queues a flush of every dirty idle line.
    ///
    /// Tick the cache until [`BusCache::is_quiescent`] to drain.
    pub fn flush_all(&mut self) {
        for slot in 0..self.lines.len() {
            let line = &self.lines[slot];
            if line.valid && line.dirty && line.state == LineState::Idle {
                self.start_flush(slot);
            }
        }
    }

    fn slot(&self, set: usize, way: usize) -> usize {
        set * self.geometry.ways + way
    }

    fn lookup(&self, addr: u32) -> Option<usize> {
        let set = self.geometry.set_index(addr);
        let tag = self.geometry.tag(addr);
        (0..self.geometry.ways)
            .map(|way| self.slot(set, way))
            .find(|&idx| {
                let line = &self.lines[idx];
                line.tag == tag
                    && (line.valid
                        || matches!(line.state, LineState::ReadPending | LineState::WritePending))
            })
    }

    fn line_addr_of(&self, slot: usize) -> u32 {
        let set = slot / self.geometry.ways;
        self.geometry.addr_of(self.lines[slot].tag, set)
    }

    fn start_flush(&mut self, slot: usize) {
        let line_addr = self.line_addr_of(slot);
        self.lines[slot].state = LineState::FlushPending;
        self.ops.push_back(BackingOp {
            slot,
            kind: OpKind::Flush,
            line_addr,
        });
        tracing::debug!("bus cache: flush {:#010x} queued", line_addr);
    }

    /// Allocates a slot for the line holding `addr`, or asks the beat to wait.
    fn allocate(&mut self, addr: u32, dir: Direction) -> BeatResult {
        let set = self.geometry.set_index(addr);
        let free = (0..self.geometry.ways).find(|&way| {
            let line = &self.lines[self.slot(set, way)];
            !line.valid && line.state == LineState::Idle
        });
        let way = match free {
            Some(way) => way,
            None => self.policy.get_victim(set),
        };
        let slot = self.slot(set, way);

        if self.lines[slot].state != LineState::Idle {
            return BeatResult::Wait;
        }
        if self.lines[slot].valid && self.lines[slot].dirty {
            self.start_flush(slot);
            return BeatResult::Wait;
        }

        let line_addr = self.geometry.line_addr(addr);
        let line = &mut self.lines[slot];
        line.tag = self.geometry.tag(addr);
        line.valid = false;
        line.dirty = false;
        line.state = match dir {
            Direction::Read => {
                self.stats.read_misses += 1;
                LineState::ReadPending
            }
            Direction::Write => {
                self.stats.write_misses += 1;
                LineState::WritePending
            }
        };
        self.ops.push_back(BackingOp {
            slot,
            kind: OpKind::Fill,
            line_addr,
        });
        tracing::debug!("bus cache: fill {:#010x} queued", line_addr);
        BeatResult::Wait
    }

    /// Returns `true` if beat `beat` is the last one of `txn` inside its line.
    fn leaves_line(&self, txn: &BusTransaction, beat: usize) -> bool {
        beat + 1 >= txn.burst_len
            || self.geometry.line_addr(txn.beat_addr(beat + 1))
                != self.geometry.line_addr(txn.beat_addr(beat))
    }

    fn issue_next(&mut self) {
        if self.in_flight.is_some() || !self.memory.is_idle() {
            return;
        }
        let Some(op) = self.ops.pop_front() else {
            return;
        };
        let req = match op.kind {
            OpKind::Fill => MemRequest::read(op.line_addr, self.geometry.line_words, op.slot as u64),
            OpKind::Flush => {
                MemRequest::write(op.line_addr, self.lines[op.slot].data.clone(), op.slot as u64)
            }
        };
        match self.memory.submit(req) {
            Ok(()) => self.in_flight = Some(op),
            Err(_) => self.ops.push_front(op),
        }
    }

    fn complete(&mut self, op: BackingOp, data: Vec<u32>, result: Result<(), BusError>) {
        let set = op.slot / self.geometry.ways;
        let way = op.slot % self.geometry.ways;
        let line = &mut self.lines[op.slot];
        line.state = LineState::Idle;

        match (op.kind, result) {
            (OpKind::Fill, Ok(())) => {
                line.data = data;
                line.data.resize(self.geometry.line_words, 0);
                line.valid = true;
                self.stats.fills += 1;
                self.policy.update(set, way);
            }
            (OpKind::Flush, Ok(())) => {
                line.dirty = false;
                self.stats.flushes += 1;
            }
            (kind, Err(err)) => {
                tracing::warn!("bus cache: {:?} of {:#010x} failed: {}", kind, op.line_addr, err);
                line.valid = line.valid && kind == OpKind::Flush;
                line.dirty = false;
                self.stats.backing_faults += 1;
                self.faults.push((op.line_addr, err));
            }
        }
    }
}

impl BusSlave for BusCache {
    fn name(&self) -> &str {
        "BusCache"
    }

    fn address_range(&self) -> (u32, u32) {
        (self.memory.base(), self.memory.size())
    }

    fn transfer(&mut self, txn: &BusTransaction, beat: usize, _clk: Clock) -> BeatResult {
        let addr = txn.beat_addr(beat);
        let line_addr = self.geometry.line_addr(addr);

        if let Some(pos) = self.faults.iter().position(|(l, _)| *l == line_addr) {
            let (_, err) = self.faults.remove(pos);
            return BeatResult::Error(err);
        }

        let Some(slot) = self.lookup(addr) else {
            return self.allocate(addr, txn.dir);
        };
        if self.lines[slot].state != LineState::Idle {
            return BeatResult::Wait;
        }

        let set = slot / self.geometry.ways;
        let way = slot % self.geometry.ways;
        let word = self.geometry.word_index(addr);
        self.policy.update(set, way);

        match txn.dir {
            Direction::Read => {
                self.stats.read_hits += 1;
                BeatResult::Read(self.lines[slot].data[word])
            }
            Direction::Write => {
                self.stats.write_hits += 1;
                let value = txn.payload.get(beat).copied().unwrap_or(0);
                let line = &mut self.lines[slot];
                line.data[word] = value;
                line.dirty = true;
                if self.write_policy == WritePolicy::WriteThrough && self.leaves_line(txn, beat) {
                    self.start_flush(slot);
                }
                BeatResult::Written
            }
        }
    }

    fn tick(&mut self, clk: Clock) {
        if clk.reset {
            self.ops.clear();
            self.in_flight = None;
            self.faults.clear();
            for line in &mut self.lines {
                line.state = LineState::Idle;
            }
            self.memory.tick(clk);
            return;
        }

        self.issue_next();
        self.memory.tick(clk);
        if let Some(resp) = self.memory.take_response() {
            if let Some(op) = self.in_flight.take() {
                self.complete(op, resp.data, resp.result);
            }
        }
    }

    fn load(&mut self, offset: u32, data: &[u8]) -> bool {
        let start = self.memory.base().wrapping_add(offset);
        if !self.memory.load_bytes(start, data) {
            return false;
        }
        let end = u64::from(start) + data.len() as u64;
        let line_bytes = u64::from(self.geometry.line_bytes());
        for slot in 0..self.lines.len() {
            if !self.lines[slot].valid || self.lines[slot].state != LineState::Idle {
                continue;
            }
            let line_start = u64::from(self.line_addr_of(slot));
            if line_start < end && u64::from(start) < line_start + line_bytes {
                self.lines[slot].valid = false;
                self.lines[slot].dirty = false;
            }
        }
        true
    }

    fn peek(&self, offset: u32) -> Option<u32> {
        let addr = self.memory.base().wrapping_add(offset);
        match self.lookup(addr) {
            Some(slot) if self.lines[slot].valid => {
                Some(self.lines[slot].data[self.geometry.word_index(addr)])
            }
            _ => self.memory.peek_word(addr),
        }
    }

    fn as_bus_cache(&self) -> Option<&BusCache> {
        Some(self)
    }

    fn as_bus_cache_mut(&mut self) -> Option<&mut BusCache> {
        Some(self)
    }
}
