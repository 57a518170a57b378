//! Control and Status Registers.
//!
//! Machine-mode trap registers and the user-level counters. Only the
//! registers listed here exist; any other address is an illegal
//! instruction.

/// Machine scratch register.
pub const MSCRATCH: u32 = 0x340;
/// Machine exception program counter.
pub const MEPC: u32 = 0x341;
/// Machine trap cause.
pub const MCAUSE: u32 = 0x342;
/// Machine trap value.
pub const MTVAL: u32 = 0x343;
/// Cycle counter (low word).
pub const CYCLE: u32 = 0xC00;
/// Retired-instruction counter (low word).
pub const INSTRET: u32 = 0xC02;
/// Cycle counter (high word).
pub const CYCLEH: u32 = 0xC80;
/// Retired-instruction counter (high word).
pub const INSTRETH: u32 = 0xC82;

/// Returns `true` for CSRs encoded as read-only (address bits 11:10 = 0b11).
pub fn is_read_only(addr: u32) -> bool {
    (addr >> 10) & 0b11 == 0b11
}

/// Machine CSR file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Csrs {
    /// Machine scratch.
    pub mscratch: u32,
    /// Machine exception program counter.
    pub mepc: u32,
    /// Machine trap cause.
    pub mcause: u32,
    /// Machine trap value.
    pub mtval: u32,
    /// Elapsed cycles.
    pub cycle: u64,
    /// Retired instructions.
    pub instret: u64,
}

impl Csrs {
    /// Creates a zeroed CSR file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `addr` names an implemented CSR.
    pub fn exists(addr: u32) -> bool {
        matches!(
            addr,
            MSCRATCH | MEPC | MCAUSE | MTVAL | CYCLE | INSTRET | CYCLEH | INSTRETH
        )
    }

    /// Reads a CSR.
    pub fn read(&self, addr: u32) -> Option<u32> {
        let val = match addr {
            MSCRATCH => self.mscratch,
            MEPC => self.mepc,
            MCAUSE => self.mcause,
            MTVAL => self.mtval,
            CYCLE => self.cycle as u32,
            CYCLEH => (self.cycle >> 32) as u32,
            INSTRET => self.instret as u32,
            INSTRETH => (self.instret >> 32) as u32,
            _ => return None,
        };
        Some(val)
    }

    /// Writes a writable CSR.
    ///
    /// # Returns
    ///
    /// `false` if the CSR does not exist or is read-only.
    pub fn write(&mut self, addr: u32, val: u32) -> bool {
        match addr {
            MSCRATCH => self.mscratch = val,
            // mepc is IALIGN=32
            MEPC => self.mepc = val & !3,
            MCAUSE => self.mcause = val,
            MTVAL => self.mtval = val,
            _ => return false,
        }
        true
    }
}
