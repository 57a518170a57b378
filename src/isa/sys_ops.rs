//! Fixed SYSTEM and MISC-MEM encodings.

/// Environment call.
pub const ECALL: u32 = 0x0000_0073;
/// Breakpoint.
pub const EBREAK: u32 = 0x0010_0073;
/// Return from machine-mode trap.
pub const MRET: u32 = 0x3020_0073;
/// Wait for interrupt (decoded as a no-op).
pub const WFI: u32 = 0x1050_0073;
/// Canonical no-op (`addi x0, x0, 0`).
pub const NOP: u32 = 0x0000_0013;
