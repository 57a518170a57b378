//! End-to-end pipeline behaviour: control flow, traps, CSRs and `fence.i`.

mod common;

use pretty_assertions::assert_eq;
use rstest::rstest;

use common::{
    boot, fast_config, read_word, run_to_exit, Asm, CAUSE, DATA, EPC, MAIN, TRAPPED, TVAL,
};
use riscv_soc::common::Trap;
use riscv_soc::config::BranchPredictor;
use riscv_soc::core::arch::csr::{CYCLE, INSTRET, MEPC, MSCRATCH};
use riscv_soc::core::{Cpu, RunOutcome};
use riscv_soc::isa::encode;

/// Address nothing on the default map decodes.
const UNMAPPED: u32 = 0x0080_0000;

#[rstest]
#[case::not_taken(BranchPredictor::NotTaken)]
#[case::btfn(BranchPredictor::Btfn)]
fn wrong_path_instructions_leave_no_trace(#[case] scheme: BranchPredictor) {
    let mut asm = Asm::new();
    asm.emit(encode::addi(2, 0, 5))
        .emit(encode::addi(3, 3, 1))
        .emit(encode::addi(2, 2, -1))
        .emit(encode::bne(2, 0, -8))
        .emit(encode::addi(4, 0, 7))
        .emit(encode::beq(0, 0, 12))
        .emit(encode::addi(5, 0, 99))
        .emit(encode::addi(6, 0, 99))
        .emit(encode::addi(7, 0, 1))
        .exit();

    let mut config = fast_config();
    config.pipeline.branch_predictor = scheme;
    let cpu = run_to_exit(&config, &asm);

    let regs: Vec<u32> = (2..=7).map(|r| cpu.regs.read(r)).collect();
    assert_eq!(regs, vec![0, 5, 7, 0, 0, 1]);
    assert!(cpu.stats.branch_predictions >= 6);
    assert!(cpu.stats.branch_mispredictions >= 2);
    assert!(cpu.stats.stalls_control >= 2);
}

#[test]
fn mispredicted_branch_refetches_on_the_following_edge() {
    let mut asm = Asm::new();
    asm.emit(encode::beq(0, 0, 8)) // 0: always taken
        .emit(encode::addi(5, 0, 1)) // 4: wrong path
        .emit(encode::addi(6, 0, 2)) // 8: target
        .exit();

    let mut config = fast_config();
    config.pipeline.branch_predictor = BranchPredictor::NotTaken;
    let mut cpu = boot(&config, &asm);

    for _ in 0..10_000 {
        if cpu.id_ex.entry.as_ref().is_some_and(|e| e.pc == 0) {
            break;
        }
        cpu.tick().unwrap();
    }
    assert_eq!(cpu.if_id.entry.as_ref().map(|e| e.pc), Some(4));

    // the edge that resolves the branch only squashes and redirects
    cpu.tick().unwrap();
    assert_eq!(cpu.if_id.entry, None);
    assert_eq!(cpu.pc, 8);

    cpu.tick().unwrap();
    assert_eq!(cpu.if_id.entry.as_ref().map(|e| e.pc), Some(8));

    assert!(matches!(cpu.run(100_000), RunOutcome::Exited(0)));
    assert_eq!((cpu.regs.read(5), cpu.regs.read(6)), (0, 2));
}

#[test]
fn branch_conditions_compare_signed_and_unsigned() {
    let mut asm = Asm::new();
    // x2 = -1, x3 = 1
    asm.emit(encode::addi(2, 0, -1)).emit(encode::addi(3, 0, 1));
    // blt -1 < 1 signed: skips the marker
    asm.emit(encode::blt(2, 3, 8)).emit(encode::addi(10, 0, 1));
    // bgeu 0xffffffff >= 1 unsigned: skips the marker
    asm.emit(encode::bgeu(2, 3, 8)).emit(encode::addi(11, 0, 1));
    // blt 1 < -1 is false: falls into the marker
    asm.emit(encode::blt(3, 2, 8)).emit(encode::addi(12, 0, 1));
    asm.exit();

    let cpu = run_to_exit(&fast_config(), &asm);
    assert_eq!(
        (cpu.regs.read(10), cpu.regs.read(11), cpu.regs.read(12)),
        (0, 0, 1)
    );
}

#[test]
fn jalr_calls_and_returns() {
    let mut asm = Asm::new();
    asm.emit(encode::jal(1, 12)) // 0: call 12
        .emit(encode::addi(6, 5, 1)) // 4: after return
        .emit(encode::jal(0, 12)) // 8: skip the callee, to 20
        .emit(encode::addi(5, 0, 40)) // 12: callee
        .emit(encode::jalr(0, 1, 0)) // 16: return to 4
        .exit(); // 20

    let cpu = run_to_exit(&fast_config(), &asm);
    assert_eq!(cpu.regs.read(1), 4);
    assert_eq!(cpu.regs.read(6), 41);
}

/// Runs `body` after the trap handler and returns the core once the handler
/// has powered off.
fn trap_program(body: impl FnOnce(&mut Asm)) -> Cpu {
    let mut asm = Asm::with_handler();
    body(&mut asm);
    // must never run: the handler exits first
    asm.emit(encode::addi(9, 0, 1)).fail(9);
    let cpu = run_to_exit(&fast_config(), &asm);
    assert_eq!(cpu.regs.read(TRAPPED), 1, "handler did not run");
    assert_eq!(cpu.regs.read(9), 0, "instruction after the trap retired");
    cpu
}

fn trap_csrs(cpu: &Cpu) -> (u32, u32, u32) {
    (cpu.regs.read(CAUSE), cpu.regs.read(EPC), cpu.regs.read(TVAL))
}

#[test]
fn illegal_instruction_traps_with_its_bits() {
    let cpu = trap_program(|asm| {
        asm.emit(0xffff_ffff);
    });
    assert_eq!(trap_csrs(&cpu), (2, MAIN, 0xffff_ffff));
    assert_eq!(cpu.stats.traps_taken, 1);
}

#[test]
fn environment_call_and_breakpoint() {
    let cpu = trap_program(|asm| {
        asm.emit(encode::ecall());
    });
    assert_eq!(trap_csrs(&cpu), (11, MAIN, 0));

    let cpu = trap_program(|asm| {
        asm.emit(encode::nop()).emit(encode::ebreak());
    });
    assert_eq!(trap_csrs(&cpu), (3, MAIN + 4, MAIN + 4));
}

#[rstest]
#[case::load_word(encode::lw(2, 1, 2), 4, DATA + 2)]
#[case::load_half(encode::lh(2, 1, 1), 4, DATA + 1)]
#[case::store_word(encode::sw(1, 2, 1), 6, DATA + 1)]
fn misaligned_data_access(#[case] inst: u32, #[case] cause: u32, #[case] tval: u32) {
    let mut epc = 0;
    let cpu = trap_program(|asm| {
        asm.li(1, DATA);
        epc = asm.here();
        asm.emit(inst);
    });
    assert_eq!(trap_csrs(&cpu), (cause, epc, tval));
}

#[rstest]
#[case::load(encode::lw(2, 1, 8), 5)]
#[case::store(encode::sw(1, 2, 8), 7)]
fn unmapped_data_access_faults(#[case] inst: u32, #[case] cause: u32) {
    let mut epc = 0;
    let cpu = trap_program(|asm| {
        asm.li(1, UNMAPPED);
        epc = asm.here();
        asm.emit(inst);
    });
    assert_eq!(trap_csrs(&cpu), (cause, epc, UNMAPPED + 8));
}

#[test]
fn jump_to_unmapped_code_faults_on_fetch() {
    let cpu = trap_program(|asm| {
        asm.li(1, UNMAPPED).emit(encode::jalr(0, 1, 0));
    });
    assert_eq!(trap_csrs(&cpu), (1, UNMAPPED, UNMAPPED));
}

#[test]
fn misaligned_jump_target_traps_at_the_jump() {
    let mut epc = 0;
    let cpu = trap_program(|asm| {
        asm.li(1, DATA + 2);
        epc = asm.here();
        asm.emit(encode::jalr(5, 1, 0));
    });
    assert_eq!(trap_csrs(&cpu), (0, epc, DATA + 2));
    // the link register is not written by a trapping jump
    assert_eq!(cpu.regs.read(5), 0);
}

#[test]
fn mret_resumes_after_the_trapping_instruction() {
    let mut asm = Asm::new();
    asm.emit(encode::jal(0, MAIN as i32));
    asm.pad_to(0x10);
    asm.emit(encode::csrrs(CAUSE, 0x342, 0))
        .emit(encode::csrrs(EPC, MEPC, 0))
        .emit(encode::addi(EPC, EPC, 4))
        .emit(encode::csrrw(0, MEPC, EPC))
        .emit(encode::addi(TRAPPED, TRAPPED, 1))
        .emit(encode::mret());
    asm.pad_to(MAIN);
    asm.emit(encode::ecall())
        .emit(encode::addi(5, 0, 5))
        .emit(encode::ecall())
        .emit(encode::addi(6, 5, 1))
        .exit();

    let cpu = run_to_exit(&fast_config(), &asm);
    assert_eq!(cpu.regs.read(TRAPPED), 2);
    assert_eq!(cpu.regs.read(CAUSE), 11);
    assert_eq!((cpu.regs.read(5), cpu.regs.read(6)), (5, 6));
    assert_eq!(cpu.csrs.mepc, MAIN + 12);
}

#[test]
fn csr_instructions_read_and_write() {
    let mut asm = Asm::new();
    asm.emit(encode::csrrwi(0, MSCRATCH, 21))
        .emit(encode::csrrs(5, MSCRATCH, 0))
        .emit(encode::addi(7, 0, 100))
        .emit(encode::csrrw(6, MSCRATCH, 7))
        .emit(encode::csrrs(8, MSCRATCH, 0))
        .emit(encode::csrrs(9, CYCLE, 0))
        .emit(encode::nop())
        .emit(encode::nop())
        .emit(encode::csrrs(10, CYCLE, 0))
        .emit(encode::csrrs(11, INSTRET, 0))
        .emit(encode::csrrs(12, INSTRET, 0))
        .exit();

    let cpu = run_to_exit(&fast_config(), &asm);
    let r = |i| cpu.regs.read(i);
    assert_eq!((r(5), r(6), r(8)), (21, 21, 100));
    assert!(r(10) > r(9), "cycle {} then {}", r(9), r(10));
    assert!(r(12) > r(11), "instret {} then {}", r(11), r(12));
    assert_eq!(cpu.csrs.mscratch, 100);
}

#[test]
fn writing_a_counter_is_illegal() {
    let cpu = trap_program(|asm| {
        asm.emit(encode::csrrw(0, CYCLE, 5));
    });
    assert_eq!(trap_csrs(&cpu).0, 2);
}

#[test]
fn sub_word_loads_extend_correctly() {
    let mut asm = Asm::new();
    asm.li(1, DATA)
        .li(2, 0x8001_ff80)
        .emit(encode::sw(1, 2, 0))
        .emit(encode::lb(3, 1, 0))
        .emit(encode::lbu(4, 1, 0))
        .emit(encode::lh(5, 1, 2))
        .emit(encode::lbu(6, 1, 1))
        .exit();

    let cpu = run_to_exit(&fast_config(), &asm);
    let regs: Vec<u32> = (3..=6).map(|r| cpu.regs.read(r)).collect();
    assert_eq!(regs, vec![0xffff_ff80, 0x80, 0xffff_8001, 0xff]);
}

#[test]
fn fence_i_makes_stored_code_visible() {
    let patched = 6 * 4;
    let mut asm = Asm::new();
    asm.li(1, patched)
        .li(2, encode::addi(5, 0, 42))
        .emit(encode::sw(1, 2, 0))
        .emit(encode::fence_i());
    assert_eq!(asm.here(), patched);
    asm.emit(encode::addi(5, 0, 1)).exit();

    let cpu = run_to_exit(&fast_config(), &asm);
    assert_eq!(cpu.regs.read(5), 42);
    assert_eq!(read_word(&cpu, patched), Some(encode::addi(5, 0, 42)));
}

#[test]
fn halt_on_trap_stops_the_run() {
    let mut config = fast_config();
    config.general.halt_on_trap = true;
    let mut asm = Asm::new();
    asm.emit(encode::nop()).emit(encode::ecall()).exit();

    let mut cpu = boot(&config, &asm);
    match cpu.run(100_000) {
        RunOutcome::Halted(record) => {
            assert_eq!(record.trap, Trap::EnvironmentCall);
            assert_eq!(record.pc, 4);
        }
        other => panic!("expected a halt, got {other:?}"),
    }
    assert_eq!(cpu.csrs.mcause, 11);
    assert_eq!(cpu.report().traps_taken, 1);
}

fn counting_program() -> Asm {
    let mut asm = Asm::new();
    asm.emit(encode::addi(5, 5, 1)).exit();
    asm
}

#[test]
fn reset_drops_traffic_in_flight_and_restarts() {
    let mut cpu = boot(&fast_config(), &counting_program());
    for _ in 0..3 {
        cpu.tick().unwrap();
    }
    assert!(!cpu.bridge.is_idle(), "first fill should still be in flight");

    cpu.reset();
    assert!(cpu.pipeline_empty());
    assert!(cpu.bridge.is_idle());
    assert!(!cpu.system.bus.is_busy());
    assert_eq!(cpu.pc, 0);

    assert!(matches!(cpu.run(100_000), RunOutcome::Exited(0)));
    assert_eq!(cpu.regs.read(5), 1);
}

#[test]
fn reset_after_retirement_runs_the_program_again() {
    let mut cpu = boot(&fast_config(), &counting_program());
    for _ in 0..10_000 {
        if cpu.regs.read(5) == 1 {
            break;
        }
        cpu.tick().unwrap();
    }
    assert_eq!(cpu.regs.read(5), 1);

    cpu.reset();
    assert!(matches!(cpu.run(100_000), RunOutcome::Exited(0)));
    // the register file survives reset
    assert_eq!(cpu.regs.read(5), 2);
}

#[test]
fn spinning_program_hits_the_cycle_limit() {
    let mut asm = Asm::new();
    asm.emit(encode::jal(0, 0));
    let mut cpu = boot(&fast_config(), &asm);
    assert!(matches!(cpu.run(2_000), RunOutcome::CycleLimit));
    assert_eq!(cpu.stats.cycles, 2_000);
}

#[test]
fn retired_instructions_are_classified() {
    let mut asm = Asm::new();
    asm.li(1, DATA) // 2 alu
        .emit(encode::sw(1, 0, 0))
        .emit(encode::lw(2, 1, 0))
        .emit(encode::beq(0, 0, 8))
        .emit(encode::nop())
        .emit(encode::csrrs(3, MSCRATCH, 0))
        .exit();

    let cpu = run_to_exit(&fast_config(), &asm);
    let s = &cpu.stats;
    assert!(s.inst_load >= 1);
    assert!(s.inst_store >= 2);
    assert!(s.inst_branch >= 1);
    assert!(s.inst_system >= 2);
    assert!(s.inst_alu >= 4);
    assert_eq!(
        s.instructions_retired,
        s.inst_load + s.inst_store + s.inst_branch + s.inst_jump + s.inst_alu + s.inst_system
    );
    assert!(s.ipc() > 0.0 && s.ipc() <= 1.0);
}
