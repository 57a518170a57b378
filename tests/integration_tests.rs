//! Whole-system tests: programs run from reset to the system controller.

mod common;

use pretty_assertions::assert_eq;
use rstest::rstest;

use common::{boot, fast_config, read_word, run_to_exit, Asm, AUX, DATA};
use riscv_soc::common::SimError;
use riscv_soc::config::{BankTiming, Config, WritePolicy};
use riscv_soc::core::{Cpu, RunOutcome};
use riscv_soc::isa::encode;
use riscv_soc::sim::loader;

/// Sums 1..=n into x3, stores it to the first AUX word and exits.
fn sum_program(n: i32) -> Asm {
    let mut asm = Asm::new();
    asm.emit(encode::addi(2, 0, n))
        .emit(encode::addi(3, 3, 0)); // keeps the loop head at 8
    assert_eq!(asm.here(), 8);
    asm.emit(encode::add(3, 3, 2))
        .emit(encode::addi(2, 2, -1))
        .emit(encode::bne(2, 0, -8))
        .li(4, AUX)
        .emit(encode::sw(4, 3, 0))
        .exit();
    asm
}

fn aux_word(cpu: &Cpu, index: u32) -> Option<u32> {
    cpu.system.bus.peek_u32(AUX + index * 4)
}

#[test]
fn sum_loop_publishes_its_result() {
    let cpu = run_to_exit(&fast_config(), &sum_program(10));
    assert_eq!(cpu.regs.read(3), 55);
    assert_eq!(aux_word(&cpu, 0), Some(55));
}

#[rstest]
#[case::fixed_fast(BankTiming::Fixed, true, WritePolicy::WriteBack)]
#[case::serial(BankTiming::Serial, true, WritePolicy::WriteBack)]
#[case::write_through(BankTiming::Fixed, true, WritePolicy::WriteThrough)]
#[case::no_bus_cache(BankTiming::Fixed, false, WritePolicy::WriteBack)]
#[case::serial_no_bus_cache(BankTiming::Serial, false, WritePolicy::WriteBack)]
fn every_memory_configuration_runs_the_same_program(
    #[case] timing: BankTiming,
    #[case] bus_cache: bool,
    #[case] policy: WritePolicy,
) {
    let mut config = fast_config();
    config.memory.timing = timing;
    config.bus_cache.enabled = bus_cache;
    config.bus_cache.write_policy = policy;

    let cpu = run_to_exit(&config, &sum_program(20));
    assert_eq!(aux_word(&cpu, 0), Some(210));
    assert_eq!(cpu.system.bus.bus_cache().is_some(), bus_cache);
}

#[test]
fn serial_banks_cost_cycles() {
    let fast = run_to_exit(&fast_config(), &sum_program(5));
    let slow = run_to_exit(&Config::default(), &sum_program(5));
    assert_eq!(slow.regs.read(3), 15);
    assert!(
        slow.stats.cycles > fast.stats.cycles,
        "serial {} vs fixed {}",
        slow.stats.cycles,
        fast.stats.cycles
    );
}

#[test]
fn multiply_and_divide() {
    let mut asm = Asm::new();
    asm.li(2, 7)
        .li(3, 0xffff_fffd) // -3
        .emit(encode::mul(4, 2, 3))
        .emit(encode::div(5, 2, 3))
        .emit(encode::div(6, 2, 0))
        .emit(encode::remu(7, 2, 0))
        .li(8, 0x8000_0000)
        .li(9, 0xffff_ffff)
        .emit(encode::div(10, 8, 9))
        .exit();

    let cpu = run_to_exit(&fast_config(), &asm);
    let r = |i| cpu.regs.read(i);
    assert_eq!(r(4), (-21i32) as u32);
    assert_eq!(r(5), (-2i32) as u32);
    assert_eq!(r(6), u32::MAX);
    assert_eq!(r(7), 7);
    assert_eq!(r(10), 0x8000_0000);
}

#[test]
fn failure_code_is_reported() {
    let mut asm = Asm::new();
    asm.fail(7);
    let mut cpu = boot(&fast_config(), &asm);
    assert!(matches!(cpu.run(100_000), RunOutcome::Exited(7)));
}

#[test]
fn results_land_in_aux_memory_and_main_memory() {
    let mut asm = Asm::new();
    asm.li(1, AUX).li(2, DATA);
    for i in 0..4 {
        asm.emit(encode::addi(3, 0, 10 * (i + 1)))
            .emit(encode::sw(1, 3, i * 4))
            .emit(encode::sw(2, 3, i * 4));
    }
    asm.exit();

    let cpu = run_to_exit(&fast_config(), &asm);
    for i in 0..4 {
        assert_eq!(aux_word(&cpu, i), Some(10 * (i + 1)));
        assert_eq!(read_word(&cpu, DATA + i * 4), Some(10 * (i + 1)));
        assert_eq!(cpu.system.bus.peek_u32(DATA + i * 4), Some(10 * (i + 1)));
    }
}

#[test]
fn busy_extra_masters_do_not_break_the_core() {
    let mut config = fast_config();
    config.bus.extra_masters = 2;
    let cpu = run_to_exit(&config, &sum_program(8));
    assert_eq!(aux_word(&cpu, 0), Some(36));
    assert_eq!(cpu.system.bus.masters(), 4);
}

#[test]
fn report_serializes_every_block() {
    let cpu = run_to_exit(&fast_config(), &sum_program(3));
    let json: serde_json::Value = serde_json::from_str(&cpu.report().to_json().unwrap()).unwrap();

    for key in [
        "cycles",
        "instructions_retired",
        "branch_mispredictions",
        "icache",
        "dcache",
        "bus",
        "bus_cache",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["cycles"], cpu.stats.cycles);
    assert!(json["icache"]["misses"].as_u64().unwrap() >= 1);
    assert!(json["bus"]["transactions"].as_u64().unwrap() >= 1);
    assert!(json["last_trap"].is_null());
}

#[test]
fn default_config_file_matches_defaults() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/default.toml");
    let from_file = Config::from_file(path).unwrap();
    assert_eq!(
        serde_json::to_value(&from_file).unwrap(),
        serde_json::to_value(Config::default()).unwrap()
    );
}

#[test]
fn partial_config_keeps_defaults() {
    let config = Config::from_toml("[memory]\ntiming = \"Fixed\"\nfixed_latency = 3\n").unwrap();
    assert_eq!(config.memory.timing, BankTiming::Fixed);
    assert_eq!(config.memory.fixed_latency, 3);
    assert_eq!(config.cache.icache.size_bytes, 1024);
    assert_eq!(config.map.syscon_base, 0x0010_0000);
}

#[rstest]
#[case::cache_size("[cache.dcache]\nsize_bytes = 1000\n")]
#[case::zero_burst("[bus]\nmax_burst = 0\n")]
#[case::odd_start("[general]\nstart_pc = 2\n")]
#[case::three_ways("[cache.icache]\nways = 3\n")]
#[case::partial_bus_cache_line("[memory]\nbank_size = 4100\n")]
fn inconsistent_config_is_rejected(#[case] text: &str) {
    assert!(matches!(Config::from_toml(text), Err(SimError::InvalidConfig(_))));
}

#[test]
fn malformed_config_is_a_parse_error() {
    assert!(matches!(
        Config::from_toml("[memory]\ntiming = 3\n"),
        Err(SimError::Config(_))
    ));
}

#[test]
fn loader_errors() {
    assert!(matches!(
        loader::load_binary("/nonexistent/program.bin"),
        Err(SimError::Io { .. })
    ));

    let mut config = fast_config();
    config.memory.bank_size = 64;
    let image = vec![0u8; 1024];
    assert!(matches!(
        loader::boot(&config, &image),
        Err(SimError::ProgramTooLarge { addr: 0, size: 1024 })
    ));
}
