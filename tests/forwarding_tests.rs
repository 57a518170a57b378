//! Operand forwarding, capture and load-use interlock tests.

mod common;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use common::{fast_config, read_word, run_to_exit, Asm, DATA};
use riscv_soc::core::pipeline::hazards::{capture_writeback, need_stall_csr};
use riscv_soc::core::pipeline::latches::{
    ExMem, ExMemEntry, IdEx, IdExEntry, IfId, IfIdEntry, MemWb, MemWbEntry,
};
use riscv_soc::core::pipeline::signals::{AluOp, ControlSignals, CsrOp};
use riscv_soc::core::units::alu::Alu;
use riscv_soc::isa::encode;

#[test]
fn dependency_chain_sees_every_result() {
    let mut asm = Asm::new();
    asm.emit(encode::addi(2, 0, 3))
        .emit(encode::add(3, 2, 2))
        .emit(encode::add(4, 3, 2))
        .emit(encode::sub(5, 4, 3))
        .emit(encode::xor(6, 5, 4))
        .emit(encode::slli(7, 6, 4))
        .exit();

    let cpu = run_to_exit(&fast_config(), &asm);
    let regs: Vec<u32> = (2..=7).map(|r| cpu.regs.read(r)).collect();
    assert_eq!(regs, vec![3, 6, 9, 3, 3 ^ 9, (3 ^ 9) << 4]);
}

#[test]
fn load_use_stalls_once_and_reads_memory() {
    let mut asm = Asm::new();
    asm.li(1, DATA)
        .emit(encode::addi(2, 0, 0x7b))
        .emit(encode::sw(1, 2, 4))
        .emit(encode::lw(3, 1, 4))
        .emit(encode::add(4, 3, 3))
        .emit(encode::lw(5, 1, 4))
        .emit(encode::nop())
        .emit(encode::add(6, 5, 5))
        .exit();

    let cpu = run_to_exit(&fast_config(), &asm);
    assert_eq!(cpu.regs.read(4), 0xf6);
    assert_eq!(cpu.regs.read(6), 0xf6);
    assert!(cpu.stats.stalls_data >= 1);
}

#[test]
fn store_data_is_forwarded() {
    let mut asm = Asm::new();
    asm.li(1, DATA)
        .emit(encode::addi(2, 0, 11))
        .emit(encode::sw(1, 2, 0))
        .emit(encode::addi(2, 2, 1))
        .emit(encode::sb(1, 2, 4))
        .exit();

    let cpu = run_to_exit(&fast_config(), &asm);
    assert_eq!(read_word(&cpu, DATA), Some(11));
    assert_eq!(read_word(&cpu, DATA + 4), Some(12));
}

#[test]
fn jal_link_value_is_forwarded() {
    let mut asm = Asm::new();
    asm.emit(encode::jal(1, 8))
        .emit(encode::nop())
        .emit(encode::addi(2, 1, 1))
        .exit();

    let cpu = run_to_exit(&fast_config(), &asm);
    assert_eq!(cpu.regs.read(1), 4);
    assert_eq!(cpu.regs.read(2), 5);
}

#[test]
fn held_entry_captures_committed_value() {
    let mut id_ex = IdEx {
        entry: Some(IdExEntry {
            rs1: 4,
            rs2: 9,
            rv1: 1,
            rv2: 2,
            ..Default::default()
        }),
    };
    let mem_wb = MemWb {
        entry: Some(MemWbEntry {
            rd: 9,
            result: 99,
            ctrl: ControlSignals {
                reg_write: true,
                ..Default::default()
            },
            ..Default::default()
        }),
    };
    capture_writeback(&mut id_ex, &mem_wb);
    let entry = id_ex.entry.unwrap();
    assert_eq!((entry.rv1, entry.rv2), (1, 99));
}

#[test]
fn csr_access_waits_for_older_csr_access() {
    let if_id = IfId {
        entry: Some(IfIdEntry {
            inst: encode::csrrs(5, 0x340, 0),
            ..Default::default()
        }),
    };
    let older = ControlSignals {
        csr_op: CsrOp::Rw,
        ..Default::default()
    };
    let ex_mem = ExMem {
        entry: Some(ExMemEntry {
            ctrl: older,
            ..Default::default()
        }),
    };
    assert!(need_stall_csr(&if_id, &IdEx::default(), &ex_mem, &MemWb::default()));
    assert!(!need_stall_csr(&if_id, &IdEx::default(), &ExMem::default(), &MemWb::default()));

    let plain = IfId {
        entry: Some(IfIdEntry {
            inst: encode::add(1, 2, 3),
            ..Default::default()
        }),
    };
    assert!(!need_stall_csr(&plain, &IdEx::default(), &ex_mem, &MemWb::default()));
}

type RType = fn(usize, usize, usize) -> u32;

const R_OPS: [(AluOp, RType); 7] = [
    (AluOp::Add, encode::add),
    (AluOp::Sub, encode::sub),
    (AluOp::Xor, encode::xor),
    (AluOp::Sltu, encode::sltu),
    (AluOp::Mul, encode::mul),
    (AluOp::Div, encode::div),
    (AluOp::Remu, encode::remu),
];

const SLOTS: u32 = 8;

#[derive(Clone, Debug)]
enum Op {
    Reg { op: usize, rd: usize, rs1: usize, rs2: usize },
    Imm { rd: usize, rs1: usize, imm: i32 },
    Load { rd: usize, slot: u32 },
    Store { rs2: usize, slot: u32 },
}

fn reg() -> impl Strategy<Value = usize> {
    2usize..8
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..R_OPS.len(), reg(), reg(), reg()).prop_map(|(op, rd, rs1, rs2)| Op::Reg { op, rd, rs1, rs2 }),
        (reg(), reg(), -2048i32..2048).prop_map(|(rd, rs1, imm)| Op::Imm { rd, rs1, imm }),
        (reg(), 0..SLOTS).prop_map(|(rd, slot)| Op::Load { rd, slot }),
        (reg(), 0..SLOTS).prop_map(|(rs2, slot)| Op::Store { rs2, slot }),
    ]
}

/// Sequential reference model of the generated programs.
fn reference(init: &[u32], ops: &[Op]) -> ([u32; 8], [u32; SLOTS as usize]) {
    let mut regs = [0u32; 8];
    regs[2..8].copy_from_slice(init);
    let mut mem = [0u32; SLOTS as usize];
    for op in ops {
        match *op {
            Op::Reg { op, rd, rs1, rs2 } => regs[rd] = Alu::execute(R_OPS[op].0, regs[rs1], regs[rs2]),
            Op::Imm { rd, rs1, imm } => regs[rd] = Alu::execute(AluOp::Add, regs[rs1], imm as u32),
            Op::Load { rd, slot } => regs[rd] = mem[slot as usize],
            Op::Store { rs2, slot } => mem[slot as usize] = regs[rs2],
        }
    }
    (regs, mem)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pipeline_matches_sequential_execution(
        init in proptest::collection::vec(any::<u32>(), 6),
        ops in proptest::collection::vec(op(), 1..40),
    ) {
        let mut asm = Asm::new();
        asm.li(1, DATA);
        for (i, value) in init.iter().enumerate() {
            asm.li(i + 2, *value);
        }
        for op in &ops {
            let word = match *op {
                Op::Reg { op, rd, rs1, rs2 } => (R_OPS[op].1)(rd, rs1, rs2),
                Op::Imm { rd, rs1, imm } => encode::addi(rd, rs1, imm),
                Op::Load { rd, slot } => encode::lw(rd, 1, slot as i32 * 4),
                Op::Store { rs2, slot } => encode::sw(1, rs2, slot as i32 * 4),
            };
            asm.emit(word);
        }
        asm.exit();

        let cpu = run_to_exit(&fast_config(), &asm);
        let (regs, mem) = reference(&init, &ops);
        for r in 2..8 {
            prop_assert_eq!(cpu.regs.read(r), regs[r], "x{}", r);
        }
        for slot in 0..SLOTS {
            prop_assert_eq!(read_word(&cpu, DATA + slot * 4), Some(mem[slot as usize]), "slot {}", slot);
        }
    }
}
