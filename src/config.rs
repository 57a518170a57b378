//! Simulator configuration.
//!
//! The configuration is a sectioned TOML document deserialized with `serde`.
//! Every field has a default so a partial file (or none at all) describes a
//! working system; `Config::default()` matches `configs/default.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::common::SimError;

const DEFAULT_START_PC: u32 = 0x0000_0000;
const DEFAULT_TRAP_VECTOR: u32 = 0x0000_0010;

const MEMORY_BASE: u32 = 0x0000_0000;
const BANK_SIZE: u32 = 128 * 1024;

const SYSCON_BASE: u32 = 0x0010_0000;
const AUX_BASE: u32 = 0x0020_0000;
const AUX_SIZE: u32 = 0x1000;

const MAX_BURST: usize = 4;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// General simulation settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// L1 cache geometry.
    #[serde(default)]
    pub cache: CacheHierarchyConfig,
    /// Bus fabric settings.
    #[serde(default)]
    pub bus: BusConfig,
    /// Second-level bus cache settings.
    #[serde(default)]
    pub bus_cache: BusCacheConfig,
    /// Triple-bank backing store settings.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Peripheral address map.
    #[serde(default)]
    pub map: MapConfig,
}

impl Config {
    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Io` if the file cannot be read, `SimError::Config`
    /// if it is not valid TOML for this structure and
    /// `SimError::InvalidConfig` if the geometry is inconsistent.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// See [`Config::from_file`].
    pub fn from_toml(text: &str) -> Result<Self, SimError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that cache geometries are powers of two and consistent.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidConfig` naming the first offending section.
    pub fn validate(&self) -> Result<(), SimError> {
        self.cache.icache.validate("cache.icache")?;
        self.cache.dcache.validate("cache.dcache")?;
        let bc = &self.bus_cache;
        check_geometry("bus_cache", bc.size_bytes, bc.line_bytes, bc.ways)?;
        if self.bus.max_burst == 0 {
            return Err(SimError::InvalidConfig(
                "bus.max_burst must be at least 1".to_string(),
            ));
        }
        if self.memory.bank_size == 0 || self.memory.bank_size % 4 != 0 {
            return Err(SimError::InvalidConfig(
                "memory.bank_size must be a non-zero multiple of 4".to_string(),
            ));
        }
        let Some(total) = self.memory.bank_size.checked_mul(3) else {
            return Err(SimError::InvalidConfig(
                "memory.bank_size: three banks do not fit in the address space".to_string(),
            ));
        };
        if u64::from(self.memory.base) + u64::from(total) > 1 << 32 {
            return Err(SimError::InvalidConfig(
                "memory: backing store runs past the end of the address space".to_string(),
            ));
        }
        if bc.enabled {
            let line = bc.line_bytes as u64;
            if u64::from(total) % line != 0 || u64::from(self.memory.base) % line != 0 {
                return Err(SimError::InvalidConfig(format!(
                    "memory: base {:#x} and size {:#x} must be whole bus_cache lines of {} bytes",
                    self.memory.base, total, bc.line_bytes
                )));
            }
        }
        if self.general.start_pc % 4 != 0 || self.general.trap_vector % 4 != 0 {
            return Err(SimError::InvalidConfig(
                "general.start_pc and general.trap_vector must be word aligned".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_geometry(name: &str, size: usize, line: usize, ways: usize) -> Result<(), SimError> {
    let ok = line >= 4
        && line.is_power_of_two()
        && ways >= 1
        && size.is_power_of_two()
        && size >= line * ways
        && (size / (line * ways)).is_power_of_two();
    if ok {
        Ok(())
    } else {
        Err(SimError::InvalidConfig(format!(
            "{name}: size {size}, line {line}, ways {ways} is not a valid geometry"
        )))
    }
}

/// General simulation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Emit a `trace` event for every pipeline stage on every cycle.
    #[serde(default)]
    pub trace_instructions: bool,

    /// Reset program counter.
    #[serde(default = "default_start_pc")]
    pub start_pc: u32,

    /// Fixed address fetch is redirected to when a trap is taken.
    #[serde(default = "default_trap_vector")]
    pub trap_vector: u32,

    /// Stop the simulation loop on the first trap instead of entering the handler.
    #[serde(default)]
    pub halt_on_trap: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            trace_instructions: false,
            start_pc: default_start_pc(),
            trap_vector: default_trap_vector(),
            halt_on_trap: false,
        }
    }
}

fn default_start_pc() -> u32 {
    DEFAULT_START_PC
}

fn default_trap_vector() -> u32 {
    DEFAULT_TRAP_VECTOR
}

/// Static branch prediction scheme used by fetch.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
pub enum BranchPredictor {
    /// Always fetch the fall-through path.
    #[default]
    NotTaken,
    /// Backward branches taken, forward branches not taken, `jal` taken.
    Btfn,
}

/// Pipeline settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PipelineConfig {
    /// Fetch-time branch prediction.
    #[serde(default)]
    pub branch_predictor: BranchPredictor,
}

/// L1 cache configuration pair.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CacheHierarchyConfig {
    /// Instruction cache.
    #[serde(default)]
    pub icache: CacheConfig,
    /// Data cache.
    #[serde(default)]
    pub dcache: CacheConfig,
}

/// Geometry and timing of one L1 cache.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Total capacity in bytes.
    #[serde(default = "d_c_size")]
    pub size_bytes: usize,

    /// Line size in bytes.
    #[serde(default = "d_c_line")]
    pub line_bytes: usize,

    /// Associativity (1 = direct mapped).
    #[serde(default = "d_c_ways")]
    pub ways: usize,

    /// Extra cycles a hit spends in `Lookup` before data is returned.
    #[serde(default)]
    pub hit_latency: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_bytes: d_c_size(),
            line_bytes: d_c_line(),
            ways: d_c_ways(),
            hit_latency: 0,
        }
    }
}

impl CacheConfig {
    /// Checks the geometry of this cache.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidConfig` for non power-of-two geometries.
    pub fn validate(&self, name: &str) -> Result<(), SimError> {
        check_geometry(name, self.size_bytes, self.line_bytes, self.ways)
    }

    /// Number of 32-bit words in a line.
    pub fn line_words(&self) -> usize {
        self.line_bytes / 4
    }
}

fn d_c_size() -> usize {
    1024
}

fn d_c_line() -> usize {
    16
}

fn d_c_ways() -> usize {
    2
}

/// Bus fabric settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusConfig {
    /// Longest burst (in beats) the bridge issues as one transaction.
    #[serde(default = "default_max_burst")]
    pub max_burst: usize,

    /// Masters beyond the two CPU ports (peripheral bus masters).
    #[serde(default)]
    pub extra_masters: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_burst: default_max_burst(),
            extra_masters: 0,
        }
    }
}

fn default_max_burst() -> usize {
    MAX_BURST
}

/// Update policy of the bus cache.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Dirty lines are flushed when evicted.
    #[default]
    WriteBack,
    /// Every write hit starts an immediate flush of the line.
    WriteThrough,
}

/// Second-level bus cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusCacheConfig {
    /// When false, memory accesses go straight to the bank controller.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Total capacity in bytes.
    #[serde(default = "d_bc_size")]
    pub size_bytes: usize,

    /// Line size in bytes.
    #[serde(default = "d_bc_line")]
    pub line_bytes: usize,

    /// Associativity.
    #[serde(default = "d_bc_ways")]
    pub ways: usize,

    /// Write hit policy.
    #[serde(default)]
    pub write_policy: WritePolicy,
}

impl Default for BusCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size_bytes: d_bc_size(),
            line_bytes: d_bc_line(),
            ways: d_bc_ways(),
            write_policy: WritePolicy::WriteBack,
        }
    }
}

fn default_true() -> bool {
    true
}

fn d_bc_size() -> usize {
    8192
}

fn d_bc_line() -> usize {
    16
}

fn d_bc_ways() -> usize {
    4
}

/// Timing model of one serial memory bank.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
pub enum BankTiming {
    /// Constant number of cycles per word.
    Fixed,
    /// Serial command/address/data shifting at `spi_divider` cycles per bit.
    #[default]
    Serial,
}

/// Triple-bank backing store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Bus address of the first byte of the backing store.
    #[serde(default = "default_memory_base")]
    pub base: u32,

    /// Capacity of each of the three banks in bytes.
    #[serde(default = "default_bank_size")]
    pub bank_size: u32,

    /// Bank timing model.
    #[serde(default)]
    pub timing: BankTiming,

    /// Cycles per word for `Fixed` timing.
    #[serde(default = "default_fixed_latency")]
    pub fixed_latency: u64,

    /// Core cycles per serial clock for `Serial` timing.
    #[serde(default = "default_spi_divider")]
    pub spi_divider: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base: default_memory_base(),
            bank_size: default_bank_size(),
            timing: BankTiming::Serial,
            fixed_latency: default_fixed_latency(),
            spi_divider: default_spi_divider(),
        }
    }
}

impl MemoryConfig {
    /// Total bytes addressable through the three banks.
    pub fn total_size(&self) -> u32 {
        self.bank_size.saturating_mul(3)
    }
}

fn default_memory_base() -> u32 {
    MEMORY_BASE
}

fn default_bank_size() -> u32 {
    BANK_SIZE
}

fn default_fixed_latency() -> u64 {
    8
}

fn default_spi_divider() -> u64 {
    1
}

/// Peripheral address map.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MapConfig {
    /// Base of the system controller.
    #[serde(default = "default_syscon_base")]
    pub syscon_base: u32,

    /// Base of the auxiliary scratch memory.
    #[serde(default = "default_aux_base")]
    pub aux_base: u32,

    /// Size of the auxiliary scratch memory in bytes.
    #[serde(default = "default_aux_size")]
    pub aux_size: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            syscon_base: default_syscon_base(),
            aux_base: default_aux_base(),
            aux_size: default_aux_size(),
        }
    }
}

fn default_syscon_base() -> u32 {
    SYSCON_BASE
}

fn default_aux_base() -> u32 {
    AUX_BASE
}

fn default_aux_size() -> u32 {
    AUX_SIZE
}
