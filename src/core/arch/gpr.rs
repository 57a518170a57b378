//! RISC-V General-Purpose Register File.
//!
//! 32 registers (x0-x31) of 32 bits. Register x0 is hardwired to zero.

use std::fmt::Write;

/// General-Purpose Register file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Gpr {
    regs: [u32; 32],
}

impl Gpr {
    /// Creates a register file with every register zeroed.
    pub fn new() -> Self {
        Self { regs: [0; 32] }
    }

    /// Reads a general-purpose register value.
    ///
    /// # Arguments
    ///
    /// * `idx` - Register index (0-31)
    ///
    /// # Returns
    ///
    /// The register value; x0 always reads 0.
    pub fn read(&self, idx: usize) -> u32 {
        if idx == 0 {
            0
        } else {
            self.regs[idx & 31]
        }
    }

    /// Writes a value to a general-purpose register.
    ///
    /// Writes to x0 are ignored.
    pub fn write(&mut self, idx: usize, val: u32) {
        if idx != 0 {
            self.regs[idx & 31] = val;
        }
    }

    /// Formats all registers, four per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for i in (0..32).step_by(4) {
            for j in i..i + 4 {
                let _ = write!(out, "x{:<2}={:#010x} ", j, self.read(j));
            }
            out.push('\n');
        }
        out
    }
}
