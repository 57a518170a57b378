//! Write-Back Data Cache.
//!
//! A write-allocate, write-back set-associative cache in front of the memory
//! stage. Stores merge into the resident word by byte lane and set the dirty
//! bit; the line reaches the bus only when it is evicted or cleaned.
//!
//! A miss picks its victim immediately. A dirty victim is copied out and
//! invalidated, and its write-back is issued on the bridge ahead of the fill,
//! so the two complete in that order. Accesses to either line stall until
//! the fill lands; hits to other resident lines are served meanwhile.

use crate::common::{BusError, Clock, MemWidth};
use crate::config::CacheConfig;
use crate::core::units::cache::policies::{LruPolicy, ReplacementPolicy};
use crate::core::units::cache::{CacheAccess, CacheGeometry, CacheLine, CacheState, CacheStats};
use crate::core::units::mem_to_bus::{BridgePort, LineOp, LineRequest, MemToBus};

#[derive(Clone, Copy)]
enum DataOp {
    Load,
    Store { value: u32, mask: u32 },
}

/// Write-allocate, write-back first-level data cache.
pub struct DataCache {
    geometry: CacheGeometry,
    lines: Vec<CacheLine>,
    policy: LruPolicy,
    state: CacheState,
    hit_latency: u64,
    fill_slot: Option<usize>,
    fault: Option<(u32, BusError)>,
    write_back_error: Option<BusError>,
    clean_error: Option<BusError>,
    /// Activity counters.
    pub stats: CacheStats,
}

impl DataCache {
    /// Creates an empty cache.
    pub fn new(config: &CacheConfig) -> Self {
        let geometry = CacheGeometry::from_config(config);
        Self {
            lines: vec![CacheLine::empty(geometry.line_words); geometry.sets * geometry.ways],
            policy: LruPolicy::new(geometry.sets, geometry.ways),
            geometry,
            state: CacheState::Idle,
            hit_latency: config.hit_latency,
            fill_slot: None,
            fault: None,
            write_back_error: None,
            clean_error: None,
            stats: CacheStats::default(),
        }
    }

    /// Controller state.
    pub fn state(&self) -> CacheState {
        self.state
    }

    /// Cache geometry.
    pub fn geometry(&self) -> CacheGeometry {
        self.geometry
    }

    /// Resident word at `addr`, if its line is present.
    pub fn peek(&self, addr: u32) -> Option<u32> {
        self.find(addr)
            .map(|idx| self.lines[idx].data[self.geometry.word_index(addr)])
    }

    /// Returns `true` if the line holding `addr` is resident and dirty.
    pub fn is_dirty(&self, addr: u32) -> bool {
        self.find(addr).is_some_and(|idx| self.lines[idx].dirty)
    }

    fn find(&self, addr: u32) -> Option<usize> {
        let set = self.geometry.set_index(addr);
        let tag = self.geometry.tag(addr);
        (0..self.geometry.ways)
            .map(|way| set * self.geometry.ways + way)
            .find(|&idx| self.lines[idx].valid && self.lines[idx].tag == tag)
    }

    /// Loads the aligned word containing `addr`.
    ///
    /// # Returns
    ///
    /// The whole word on a hit; the caller extracts the addressed bytes.
    pub fn load(&mut self, addr: u32, bridge: &mut MemToBus) -> CacheAccess<u32> {
        self.access(addr, DataOp::Load, bridge)
    }

    /// Stores the low `width` bytes of `value` at `addr`.
    ///
    /// # Arguments
    ///
    /// * `addr` - Naturally aligned store address.
    /// * `width` - Access width.
    /// * `value` - Register value; only its low bytes are stored.
    /// * `bridge` - Bridge used to allocate on a miss.
    pub fn store(
        &mut self,
        addr: u32,
        width: MemWidth,
        value: u32,
        bridge: &mut MemToBus,
    ) -> CacheAccess<()> {
        let shift = (addr & 3) * 8;
        let op = DataOp::Store {
            value: value.wrapping_shl(shift),
            mask: width.lane_mask(addr),
        };
        match self.access(addr, op, bridge) {
            CacheAccess::Hit(_) => CacheAccess::Hit(()),
            CacheAccess::Stall => CacheAccess::Stall,
            CacheAccess::Fault(err) => CacheAccess::Fault(err),
        }
    }

    fn access(&mut self, addr: u32, op: DataOp, bridge: &mut MemToBus) -> CacheAccess<u32> {
        let line = self.geometry.line_addr(addr);

        if let Some((faulted, err)) = self.fault {
            if faulted == line {
                self.fault = None;
                return CacheAccess::Fault(err);
            }
        }
        if self.state.busy_with(line) {
            self.stats.stall_cycles += 1;
            return CacheAccess::Stall;
        }

        if let Some(idx) = self.find(addr) {
            match self.state {
                CacheState::Lookup { line: l, remaining } if l == line => {
                    if remaining > 0 {
                        self.stats.stall_cycles += 1;
                        return CacheAccess::Stall;
                    }
                    self.state = CacheState::Idle;
                }
                CacheState::Idle | CacheState::Lookup { .. } if self.hit_latency > 0 => {
                    self.state = CacheState::Lookup {
                        line,
                        remaining: self.hit_latency,
                    };
                    self.stats.stall_cycles += 1;
                    return CacheAccess::Stall;
                }
                _ => {}
            }

            self.stats.hits += 1;
            let set = self.geometry.set_index(addr);
            self.policy.update(set, idx % self.geometry.ways);
            let word = self.geometry.word_index(addr);
            let entry = &mut self.lines[idx];
            if let DataOp::Store { value, mask } = op {
                entry.data[word] = (entry.data[word] & !mask) | (value & mask);
                entry.dirty = true;
            }
            return CacheAccess::Hit(entry.data[word]);
        }

        self.stats.stall_cycles += 1;
        if !matches!(self.state, CacheState::Idle | CacheState::Lookup { .. }) {
            return CacheAccess::Stall;
        }
        self.allocate(line, bridge);
        CacheAccess::Stall
    }

    /// Picks a victim for `line` and starts the write-back and fill.
    fn allocate(&mut self, line: u32, bridge: &mut MemToBus) {
        let set = self.geometry.set_index(line);
        let base = set * self.geometry.ways;
        let way = (0..self.geometry.ways)
            .find(|&w| !self.lines[base + w].valid)
            .unwrap_or_else(|| self.policy.get_victim(set));
        let slot = base + way;

        self.stats.misses += 1;
        let victim = &mut self.lines[slot];
        if victim.valid && victim.dirty {
            let victim_addr = self.geometry.addr_of(victim.tag, set);
            let data = victim.data.clone();
            victim.valid = false;
            victim.dirty = false;
            tracing::debug!(
                "dcache: miss {:#010x}, writing back victim {:#010x}",
                line,
                victim_addr
            );
            bridge.issue(BridgePort::Data, LineRequest::write_back(victim_addr, data));
            bridge.issue(
                BridgePort::Data,
                LineRequest::fill(line, self.geometry.line_words),
            );
            self.stats.write_backs += 1;
            self.state = CacheState::WriteBack {
                victim: victim_addr,
                line,
            };
        } else {
            victim.valid = false;
            tracing::debug!("dcache: miss, filling line {:#010x}", line);
            bridge.issue(
                BridgePort::Data,
                LineRequest::fill(line, self.geometry.line_words),
            );
            self.state = CacheState::MissFill { line };
        }
        self.fill_slot = Some(slot);
    }

    /// Writes back every dirty line.
    ///
    /// Call once per tick until it returns `Hit`. Accesses stall while the
    /// write-backs drain.
    pub fn clean_all(&mut self, bridge: &mut MemToBus) -> CacheAccess<()> {
        if !matches!(self.state, CacheState::Idle | CacheState::Lookup { .. }) {
            return CacheAccess::Stall;
        }
        if let Some(err) = self.clean_error.take() {
            return CacheAccess::Fault(err);
        }

        let mut outstanding = 0;
        for slot in 0..self.lines.len() {
            let set = slot / self.geometry.ways;
            let line = &mut self.lines[slot];
            if line.valid && line.dirty {
                line.dirty = false;
                let addr = self.geometry.addr_of(line.tag, set);
                bridge.issue(BridgePort::Data, LineRequest::write_back(addr, line.data.clone()));
                outstanding += 1;
            }
        }
        if outstanding == 0 {
            self.state = CacheState::Idle;
            return CacheAccess::Hit(());
        }

        tracing::debug!("dcache: cleaning {} dirty lines", outstanding);
        self.stats.write_backs += outstanding as u64;
        self.state = CacheState::Stall { outstanding };
        CacheAccess::Stall
    }

    /// Drops every line, dirty data included.
    ///
    /// An in-flight fill still completes and installs its line.
    pub fn invalidate_all(&mut self) {
        for (slot, line) in self.lines.iter_mut().enumerate() {
            if Some(slot) != self.fill_slot {
                line.valid = false;
                line.dirty = false;
            }
        }
        if matches!(self.state, CacheState::Lookup { .. }) {
            self.state = CacheState::Idle;
        }
    }

    /// Advances the hit-latency counter and consumes bridge completions.
    pub fn tick(&mut self, clk: Clock, bridge: &mut MemToBus) {
        if clk.reset {
            self.state = CacheState::Idle;
            self.fill_slot = None;
            self.fault = None;
            self.write_back_error = None;
            self.clean_error = None;
            return;
        }

        if let CacheState::Lookup { line, remaining } = self.state {
            self.state = CacheState::Lookup {
                line,
                remaining: remaining.saturating_sub(1),
            };
        }

        while let Some(resp) = bridge.take_completion(BridgePort::Data) {
            match resp.op {
                LineOp::WriteBack => self.write_back_done(resp.addr, resp.result),
                LineOp::Fill => self.fill_done(resp.addr, resp.data, resp.result),
            }
        }
    }

    fn write_back_done(&mut self, addr: u32, result: Result<(), BusError>) {
        if let Err(err) = result {
            self.stats.bus_errors += 1;
            tracing::warn!("dcache: write-back of {:#010x} failed: {}", addr, err);
        }
        match self.state {
            CacheState::WriteBack { line, .. } => {
                if let Err(err) = result {
                    self.write_back_error = Some(err);
                }
                self.state = CacheState::MissFill { line };
            }
            CacheState::Stall { outstanding } => {
                if let Err(err) = result {
                    self.clean_error.get_or_insert(err);
                }
                self.state = match outstanding.saturating_sub(1) {
                    0 => CacheState::Idle,
                    left => CacheState::Stall { outstanding: left },
                };
            }
            _ => {}
        }
    }

    fn fill_done(&mut self, addr: u32, mut data: Vec<u32>, result: Result<(), BusError>) {
        self.state = CacheState::Idle;
        let Some(slot) = self.fill_slot.take() else {
            return;
        };

        let failure = match result {
            Err(err) => {
                self.stats.bus_errors += 1;
                Some(err)
            }
            Ok(()) => self.write_back_error.take(),
        };
        if let Some(err) = failure {
            tracing::debug!("dcache: fill {:#010x} failed: {}", addr, err);
            self.write_back_error = None;
            self.fault = Some((addr, err));
            return;
        }

        let set = slot / self.geometry.ways;
        data.resize(self.geometry.line_words, 0);
        self.lines[slot] = CacheLine {
            tag: self.geometry.tag(addr),
            valid: true,
            dirty: false,
            data,
        };
        self.policy.update(set, slot % self.geometry.ways);
        self.stats.fills += 1;
    }
}
