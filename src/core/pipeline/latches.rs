//! Pipeline latch structures for inter-stage communication.
//!
//! The pipeline is single-issue: each latch holds at most one instruction.
//! An empty latch is a bubble. A trap raised by a stage is recorded in the
//! entry and carried forward until writeback, where it is taken.

use crate::common::error::Trap;
use crate::core::pipeline::signals::ControlSignals;
use crate::core::pipeline::traits::PipelineLatch;

/// Entry in the IF/ID latch (Fetch to Decode).
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct IfIdEntry {
    /// Program counter of the instruction.
    pub pc: u32,
    /// Instruction encoding.
    pub inst: u32,
    /// Fetch predicted a taken control transfer.
    pub pred_taken: bool,
    /// Predicted target when `pred_taken`.
    pub pred_target: u32,
    /// Trap raised during fetch.
    pub trap: Option<Trap>,
}

/// Entry in the ID/EX latch (Decode to Execute).
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct IdExEntry {
    /// Program counter of the instruction.
    pub pc: u32,
    /// Instruction encoding.
    pub inst: u32,
    /// First source register index.
    pub rs1: usize,
    /// Second source register index.
    pub rs2: usize,
    /// Destination register index.
    pub rd: usize,
    /// Sign-extended immediate.
    pub imm: i32,
    /// Value of rs1 as captured so far.
    pub rv1: u32,
    /// Value of rs2 as captured so far.
    pub rv2: u32,
    /// Control signals.
    pub ctrl: ControlSignals,
    /// Trap raised during fetch or decode.
    pub trap: Option<Trap>,
    /// Fetch predicted a taken control transfer.
    pub pred_taken: bool,
    /// Predicted target when `pred_taken`.
    pub pred_target: u32,
}

/// Entry in the EX/MEM latch (Execute to Memory).
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct ExMemEntry {
    /// Program counter of the instruction.
    pub pc: u32,
    /// Instruction encoding.
    pub inst: u32,
    /// Destination register index.
    pub rd: usize,
    /// Result for rd, or the effective address for loads and stores.
    pub alu: u32,
    /// Value to store.
    pub store_data: u32,
    /// Control signals.
    pub ctrl: ControlSignals,
    /// Pending CSR write (address, value), committed at writeback.
    pub csr_write: Option<(u32, u32)>,
    /// Trap raised so far.
    pub trap: Option<Trap>,
}

/// Entry in the MEM/WB latch (Memory to Writeback).
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct MemWbEntry {
    /// Program counter of the instruction.
    pub pc: u32,
    /// Instruction encoding.
    pub inst: u32,
    /// Destination register index.
    pub rd: usize,
    /// Value written to rd.
    pub result: u32,
    /// Control signals.
    pub ctrl: ControlSignals,
    /// Pending CSR write (address, value).
    pub csr_write: Option<(u32, u32)>,
    /// Trap taken at writeback.
    pub trap: Option<Trap>,
}

macro_rules! latch {
    ($(#[$doc:meta])* $name:ident, $entry:ty) => {
        $(#[$doc])*
        #[derive(Clone, Default, Debug, PartialEq, Eq)]
        pub struct $name {
            /// The latched instruction, or `None` for a bubble.
            pub entry: Option<$entry>,
        }

        impl PipelineLatch for $name {
            fn flush(&mut self) {
                self.entry = None;
            }

            fn is_empty(&self) -> bool {
                self.entry.is_none()
            }
        }
    };
}

latch!(
    /// IF/ID latch.
    IfId,
    IfIdEntry
);
latch!(
    /// ID/EX latch.
    IdEx,
    IdExEntry
);
latch!(
    /// EX/MEM latch.
    ExMem,
    ExMemEntry
);
latch!(
    /// MEM/WB latch.
    MemWb,
    MemWbEntry
);
