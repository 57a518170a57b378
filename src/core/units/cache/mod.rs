//! Cache Subsystem.
//!
//! This module holds the pieces shared by the first-level caches and the bus
//! cache: address geometry, line storage, the controller state enum, the
//! result of an access attempt and statistics.
//!
//! 1. **Instruction cache:** read-only, filled through the bridge.
//! 2. **Data cache:** write-allocate, write-back with byte-lane merging.

use serde::Serialize;

use crate::common::BusError;
use crate::config::CacheConfig;

/// Data cache controller.
pub mod dcache;
/// Instruction cache controller.
pub mod icache;
/// Replacement policies.
pub mod policies;

pub use dcache::DataCache;
pub use icache::InstructionCache;

/// Address split of a set-associative cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheGeometry {
    /// Number of sets.
    pub sets: usize,
    /// Associativity.
    pub ways: usize,
    /// Words per line.
    pub line_words: usize,
    offset_bits: u32,
    index_bits: u32,
}

impl CacheGeometry {
    /// Builds the geometry for `size_bytes` of `line_bytes` lines in `ways` ways.
    ///
    /// All three values are expected to be powers of two.
    pub fn new(size_bytes: usize, line_bytes: usize, ways: usize) -> Self {
        let ways = ways.max(1);
        let line_bytes = line_bytes.max(4);
        let sets = (size_bytes / (line_bytes * ways)).max(1);
        Self {
            sets,
            ways,
            line_words: line_bytes / 4,
            offset_bits: line_bytes.trailing_zeros(),
            index_bits: sets.trailing_zeros(),
        }
    }

    /// Geometry of a first-level cache.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.size_bytes, config.line_bytes, config.ways)
    }

    /// Bytes per line.
    pub fn line_bytes(&self) -> u32 {
        1 << self.offset_bits
    }

    /// Line-aligned address containing `addr`.
    pub fn line_addr(&self, addr: u32) -> u32 {
        addr & !(self.line_bytes() - 1)
    }

    /// Set index of `addr`.
    pub fn set_index(&self, addr: u32) -> usize {
        ((addr >> self.offset_bits) as usize) & (self.sets - 1)
    }

    /// Tag of `addr`.
    pub fn tag(&self, addr: u32) -> u32 {
        addr.checked_shr(self.offset_bits + self.index_bits)
            .unwrap_or(0)
    }

    /// Word index of `addr` inside its line.
    pub fn word_index(&self, addr: u32) -> usize {
        ((addr & (self.line_bytes() - 1)) >> 2) as usize
    }

    /// Rebuilds the line address from a tag and set.
    pub fn addr_of(&self, tag: u32, set: usize) -> u32 {
        let tag_part = tag
            .checked_shl(self.offset_bits + self.index_bits)
            .unwrap_or(0);
        tag_part | ((set as u32) << self.offset_bits)
    }
}

/// A single cache line.
#[derive(Clone, Debug, Default)]
pub struct CacheLine {
    /// Address tag.
    pub tag: u32,
    /// Line holds valid data.
    pub valid: bool,
    /// Line differs from memory (data caches only).
    pub dirty: bool,
    /// Line payload, one entry per word.
    pub data: Vec<u32>,
}

impl CacheLine {
    /// Creates an invalid line of `words` words.
    pub fn empty(words: usize) -> Self {
        Self {
            tag: 0,
            valid: false,
            dirty: false,
            data: vec![0; words],
        }
    }
}

/// Controller state of a first-level cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheState {
    /// No operation in flight.
    #[default]
    Idle,
    /// A hit is waiting out the configured hit latency.
    Lookup {
        /// Line being looked up.
        line: u32,
        /// Ticks left before the data is returned.
        remaining: u64,
    },
    /// A line fill is in flight.
    MissFill {
        /// Line being filled.
        line: u32,
    },
    /// A dirty victim is being written back ahead of a fill.
    WriteBack {
        /// Address of the victim line.
        victim: u32,
        /// Line filled once the write-back completes.
        line: u32,
    },
    /// The cache is draining dirty lines and blocks every request.
    Stall {
        /// Write-backs not yet acknowledged.
        outstanding: usize,
    },
}

impl CacheState {
    /// Returns `true` if an in-flight operation touches `line`.
    pub fn busy_with(&self, line: u32) -> bool {
        match *self {
            CacheState::MissFill { line: l } => l == line,
            CacheState::WriteBack { victim, line: l } => victim == line || l == line,
            CacheState::Stall { .. } => true,
            CacheState::Idle | CacheState::Lookup { .. } => false,
        }
    }
}

/// Outcome of one access attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheAccess<T> {
    /// The access completed this tick.
    Hit(T),
    /// Retry next tick.
    Stall,
    /// The line could not be brought in.
    Fault(BusError),
}

/// Cache statistics.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    /// Accesses served from a resident line.
    pub hits: u64,
    /// Accesses that started a fill.
    pub misses: u64,
    /// Completed fills.
    pub fills: u64,
    /// Dirty lines written back.
    pub write_backs: u64,
    /// Ticks an access was answered with `Stall`.
    pub stall_cycles: u64,
    /// Fills or write-backs that completed with a bus error.
    pub bus_errors: u64,
}

impl CacheStats {
    /// Hit rate over all counted accesses, or 0 with no accesses.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
