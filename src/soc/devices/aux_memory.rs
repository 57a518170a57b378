//! Auxiliary Scratch Memory.
//!
//! A small SRAM answering every beat in the cycle it is presented. Test
//! firmware writes its result words here by index.

use crate::common::{BusError, Clock};
use crate::soc::traits::{BeatResult, BusSlave};
use crate::soc::transaction::{BusTransaction, Direction};

/// Single-cycle word-addressed SRAM.
pub struct AuxMemory {
    base: u32,
    words: Vec<u32>,
}

impl AuxMemory {
    /// Creates `size` bytes of zeroed memory at `base`.
    pub fn new(base: u32, size: u32) -> Self {
        Self {
            base,
            words: vec![0; (size / 4) as usize],
        }
    }

    /// Word `index` of the memory.
    pub fn word(&self, index: usize) -> Option<u32> {
        self.words.get(index).copied()
    }
}

impl BusSlave for AuxMemory {
    fn name(&self) -> &str {
        "AuxMemory"
    }

    fn address_range(&self) -> (u32, u32) {
        (self.base, self.words.len() as u32 * 4)
    }

    fn transfer(&mut self, txn: &BusTransaction, beat: usize, _clk: Clock) -> BeatResult {
        let addr = txn.beat_addr(beat);
        let index = (addr.wrapping_sub(self.base) / 4) as usize;
        let Some(cell) = self.words.get_mut(index) else {
            return BeatResult::Error(BusError::SlaveFault(addr));
        };
        match txn.dir {
            Direction::Read => BeatResult::Read(*cell),
            Direction::Write => {
                *cell = txn.payload.get(beat).copied().unwrap_or(0);
                BeatResult::Written
            }
        }
    }

    fn load(&mut self, offset: u32, data: &[u8]) -> bool {
        for (i, byte) in data.iter().enumerate() {
            let at = offset as usize + i;
            let Some(cell) = self.words.get_mut(at / 4) else {
                return false;
            };
            let shift = (at % 4) * 8;
            *cell = (*cell & !(0xff << shift)) | (u32::from(*byte) << shift);
        }
        true
    }

    fn peek(&self, offset: u32) -> Option<u32> {
        self.word((offset / 4) as usize)
    }
}
