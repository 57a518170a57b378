//! Shared helpers for the integration tests: a tiny program builder and
//! ready-made configurations.

#![allow(dead_code)]

use riscv_soc::config::{BankTiming, Config};
use riscv_soc::core::{Cpu, RunOutcome};
use riscv_soc::isa::encode;
use riscv_soc::sim::loader;

/// System controller base in the default map.
pub const SYSCON: u32 = 0x0010_0000;
/// Auxiliary scratch memory base in the default map.
pub const AUX: u32 = 0x0020_0000;
/// First instruction of `main` in programs built with [`Asm::with_handler`].
pub const MAIN: u32 = 0x40;
/// Data area used by the tests, well clear of the code.
pub const DATA: u32 = 0x2000;

/// Register the handler sets to 1 when it runs.
pub const TRAPPED: usize = 31;
/// Register holding `mcause` after the handler ran.
pub const CAUSE: usize = 30;
/// Register holding `mepc` after the handler ran.
pub const EPC: usize = 29;
/// Register holding `mtval` after the handler ran.
pub const TVAL: usize = 26;

/// Minimal program builder.
#[derive(Default)]
pub struct Asm {
    pub words: Vec<u32>,
}

impl Asm {
    /// Empty program starting at address 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Program with a jump to `MAIN` at 0 and a trap handler at the default
    /// trap vector (0x10) that records the trap CSRs and powers off.
    pub fn with_handler() -> Self {
        let mut asm = Self::new();
        asm.emit(encode::jal(0, MAIN as i32));
        asm.pad_to(0x10);
        asm.emit(encode::csrrs(CAUSE, 0x342, 0))
            .emit(encode::csrrs(EPC, 0x341, 0))
            .emit(encode::csrrs(TVAL, 0x343, 0))
            .emit(encode::addi(TRAPPED, 0, 1))
            .exit();
        asm.pad_to(MAIN);
        asm
    }

    /// Address of the next instruction.
    pub fn here(&self) -> u32 {
        self.words.len() as u32 * 4
    }

    pub fn emit(&mut self, word: u32) -> &mut Self {
        self.words.push(word);
        self
    }

    pub fn emit_all(&mut self, words: &[u32]) -> &mut Self {
        self.words.extend_from_slice(words);
        self
    }

    pub fn li(&mut self, rd: usize, value: u32) -> &mut Self {
        self.emit_all(&encode::li(rd, value))
    }

    /// Fills with `nop` up to `addr`.
    pub fn pad_to(&mut self, addr: u32) -> &mut Self {
        assert!(self.here() <= addr, "program overlaps {addr:#x}");
        while self.here() < addr {
            self.emit(encode::nop());
        }
        self
    }

    /// Writes `value` to the system controller, publishes it with
    /// `fence.i` and spins.
    pub fn syscon_write(&mut self, value: u32) -> &mut Self {
        self.li(28, SYSCON)
            .li(27, value)
            .emit(encode::sw(28, 27, 0))
            .emit(encode::fence_i())
            .emit(encode::jal(0, 0))
    }

    /// Powers off with exit code 0.
    pub fn exit(&mut self) -> &mut Self {
        self.syscon_write(0x5555)
    }

    /// Reports failure with `code`.
    pub fn fail(&mut self, code: u16) -> &mut Self {
        self.syscon_write((u32::from(code) << 16) | 0x3333)
    }

    pub fn bytes(&self) -> Vec<u8> {
        encode::to_bytes(&self.words)
    }
}

/// Default configuration with single-cycle fixed-latency banks.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.memory.timing = BankTiming::Fixed;
    config.memory.fixed_latency = 1;
    config
}

/// Boots `asm` on `config`.
pub fn boot(config: &Config, asm: &Asm) -> Cpu {
    loader::boot(config, &asm.bytes()).expect("program loads")
}

/// Runs `asm` until it exits and returns the core.
pub fn run_to_exit(config: &Config, asm: &Asm) -> Cpu {
    let mut cpu = boot(config, asm);
    match cpu.run(500_000) {
        RunOutcome::Exited(_) => cpu,
        other => panic!("program did not exit: {other:?} at pc={:#x}", cpu.pc),
    }
}

/// Architectural value of the word at `addr` (data cache first, then bus).
pub fn read_word(cpu: &Cpu, addr: u32) -> Option<u32> {
    cpu.dcache
        .peek(addr)
        .or_else(|| cpu.system.bus.peek_u32(addr))
}
