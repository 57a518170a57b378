//! Instruction Cache.
//!
//! A read-only set-associative cache in front of the fetch stage. Lines are
//! brought in whole through the bridge's instruction port; a line is never
//! written, so victims are simply overwritten when the fill completes.
//!
//! One fill is in flight at a time. While it is, hits to other resident
//! lines are still served, which keeps a redirected fetch stream moving even
//! if the fill belongs to a squashed path.

use crate::common::{BusError, Clock};
use crate::config::CacheConfig;
use crate::core::units::cache::policies::{LruPolicy, ReplacementPolicy};
use crate::core::units::cache::{CacheAccess, CacheGeometry, CacheLine, CacheState, CacheStats};
use crate::core::units::mem_to_bus::{BridgePort, LineOp, LineRequest, MemToBus};

/// Read-only first-level instruction cache.
pub struct InstructionCache {
    geometry: CacheGeometry,
    lines: Vec<CacheLine>,
    policy: LruPolicy,
    state: CacheState,
    hit_latency: u64,
    fault: Option<(u32, BusError)>,
    /// Activity counters.
    pub stats: CacheStats,
}

impl InstructionCache {
    /// Creates an empty cache.
    pub fn new(config: &CacheConfig) -> Self {
        let geometry = CacheGeometry::from_config(config);
        Self {
            lines: vec![CacheLine::empty(geometry.line_words); geometry.sets * geometry.ways],
            policy: LruPolicy::new(geometry.sets, geometry.ways),
            geometry,
            state: CacheState::Idle,
            hit_latency: config.hit_latency,
            fault: None,
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

    /// Returns `true` while a line fill is in flight.
    pub fn is_filling(&self) -> bool {
        matches!(self.state, CacheState::MissFill { .. })
    }

    /// Returns `true` if the line holding `addr` is resident.
    pub fn contains(&self, addr: u32) -> bool {
        self.find(addr).is_some()
    }

    fn find(&self, addr: u32) -> Option<usize> {
        let set = self.geometry.set_index(addr);
        let tag = self.geometry.tag(addr);
        (0..self.geometry.ways)
            .map(|way| set * self.geometry.ways + way)
            .find(|&idx| self.lines[idx].valid && self.lines[idx].tag == tag)
    }

    /// Fetches the instruction word at `addr`.
    ///
    /// # Arguments
    ///
    /// * `addr` - Word-aligned fetch address.
    /// * `bridge` - Bridge used to request a fill on a miss.
    ///
    /// # Returns
    ///
    /// The word on a hit, `Stall` while waiting, or the bus error of a
    /// failed fill of this line.
    pub fn fetch(&mut self, addr: u32, bridge: &mut MemToBus) -> CacheAccess<u32> {
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
            return CacheAccess::Hit(self.lines[idx].data[self.geometry.word_index(addr)]);
        }

        self.stats.stall_cycles += 1;
        if matches!(self.state, CacheState::MissFill { .. }) {
            return CacheAccess::Stall;
        }

        self.stats.misses += 1;
        tracing::debug!("icache: miss {:#010x}, filling line {:#010x}", addr, line);
        bridge.issue(
            BridgePort::Instruction,
            LineRequest::fill(line, self.geometry.line_words),
        );
        self.state = CacheState::MissFill { line };
        CacheAccess::Stall
    }

    /// Advances the hit-latency counter and installs completed fills.
    pub fn tick(&mut self, clk: Clock, bridge: &mut MemToBus) {
        if clk.reset {
            self.state = CacheState::Idle;
            self.fault = None;
            return;
        }

        if let CacheState::Lookup { line, remaining } = self.state {
            self.state = CacheState::Lookup {
                line,
                remaining: remaining.saturating_sub(1),
            };
        }

        while let Some(resp) = bridge.take_completion(BridgePort::Instruction) {
            if resp.op != LineOp::Fill {
                continue;
            }
            self.state = CacheState::Idle;
            match resp.result {
                Ok(()) => self.install(resp.addr, resp.data),
                Err(err) => {
                    self.stats.bus_errors += 1;
                    tracing::debug!("icache: fill {:#010x} failed: {}", resp.addr, err);
                    self.fault = Some((resp.addr, err));
                }
            }
        }
    }

    fn install(&mut self, line_addr: u32, mut data: Vec<u32>) {
        let set = self.geometry.set_index(line_addr);
        let base = set * self.geometry.ways;
        let way = (0..self.geometry.ways)
            .find(|&w| !self.lines[base + w].valid)
            .unwrap_or_else(|| self.policy.get_victim(set));

        data.resize(self.geometry.line_words, 0);
        self.lines[base + way] = CacheLine {
            tag: self.geometry.tag(line_addr),
            valid: true,
            dirty: false,
            data,
        };
        self.policy.update(set, way);
        self.stats.fills += 1;
        tracing::debug!("icache: installed {:#010x} in set {} way {}", line_addr, set, way);
    }

    /// Drops every line.
    ///
    /// An in-flight fill still completes and installs its line.
    pub fn invalidate_all(&mut self) {
        for line in &mut self.lines {
            line.valid = false;
        }
        if matches!(self.state, CacheState::Lookup { .. }) {
            self.state = CacheState::Idle;
        }
        tracing::debug!("icache: invalidated");
    }
}
