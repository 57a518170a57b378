//! Memory Access Types.
//!
//! This module defines the classification of memory accesses used by the
//! pipeline and the caches. The access type decides which trap is raised
//! when the bus reports a fault.

/// Type of memory access operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    /// Instruction fetch access.
    Fetch,

    /// Data read access.
    Read,

    /// Data write access.
    Write,
}

/// Memory access width for load and store operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MemWidth {
    /// No memory operation.
    #[default]
    Nop,
    /// 8-bit byte access.
    Byte,
    /// 16-bit half-word access.
    Half,
    /// 32-bit word access.
    Word,
}

impl MemWidth {
    /// Returns the access size in bytes (0 for `Nop`).
    pub fn bytes(self) -> u32 {
        match self {
            MemWidth::Nop => 0,
            MemWidth::Byte => 1,
            MemWidth::Half => 2,
            MemWidth::Word => 4,
        }
    }

    /// Returns `true` if `addr` is naturally aligned for this width.
    pub fn is_aligned(self, addr: u32) -> bool {
        match self {
            MemWidth::Nop | MemWidth::Byte => true,
            MemWidth::Half => addr & 1 == 0,
            MemWidth::Word => addr & 3 == 0,
        }
    }

    /// Byte-lane mask of this access inside its 32-bit word, already shifted
    /// to the lane selected by the low address bits.
    pub fn lane_mask(self, addr: u32) -> u32 {
        let shift = (addr & 3) * 8;
        match self {
            MemWidth::Nop => 0,
            MemWidth::Byte => 0xff << shift,
            MemWidth::Half => 0xffff << shift,
            MemWidth::Word => 0xffff_ffff,
        }
    }
}
