//! Branch Resolution and Static Prediction.
//!
//! Branches are predicted at fetch from the instruction bits alone and
//! resolved in Execute. The predictor never needs training state.

use crate::config::BranchPredictor;
use crate::core::pipeline::signals::BranchCond;
use crate::isa::decode::{imm_b, imm_j};
use crate::isa::instruction::InstructionBits;
use crate::isa::opcodes;

/// Evaluates a branch condition.
pub fn branch_taken(cond: BranchCond, a: u32, b: u32) -> bool {
    match cond {
        BranchCond::Eq => a == b,
        BranchCond::Ne => a != b,
        BranchCond::Lt => (a as i32) < (b as i32),
        BranchCond::Ge => (a as i32) >= (b as i32),
        BranchCond::Ltu => a < b,
        BranchCond::Geu => a >= b,
    }
}

/// Static branch predictor.
#[derive(Clone, Copy, Debug)]
pub struct StaticPredictor {
    scheme: BranchPredictor,
}

impl StaticPredictor {
    /// Creates a predictor using `scheme`.
    pub fn new(scheme: BranchPredictor) -> Self {
        Self { scheme }
    }

    /// Predicts the next fetch address after `inst` at `pc`.
    ///
    /// # Returns
    ///
    /// `Some(target)` if the transfer is predicted taken, `None` to fall
    /// through to `pc + 4`.
    pub fn predict(&self, pc: u32, inst: u32) -> Option<u32> {
        match self.scheme {
            BranchPredictor::NotTaken => None,
            BranchPredictor::Btfn => match inst.opcode() {
                opcodes::OP_JAL => Some(pc.wrapping_add(imm_j(inst) as u32)),
                opcodes::OP_BRANCH => {
                    let offset = imm_b(inst);
                    (offset < 0).then(|| pc.wrapping_add(offset as u32))
                }
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::encode;

    #[test]
    fn btfn_takes_backward_branches_and_jal() {
        let p = StaticPredictor::new(BranchPredictor::Btfn);
        assert_eq!(p.predict(0x100, encode::bne(1, 2, -8)), Some(0xf8));
        assert_eq!(p.predict(0x100, encode::bne(1, 2, 8)), None);
        assert_eq!(p.predict(0x100, encode::jal(0, 0x20)), Some(0x120));
        assert_eq!(p.predict(0x100, encode::jalr(0, 1, 0)), None);
    }

    #[test]
    fn not_taken_never_redirects() {
        let p = StaticPredictor::new(BranchPredictor::NotTaken);
        assert_eq!(p.predict(0x100, encode::jal(0, 0x20)), None);
    }
}
