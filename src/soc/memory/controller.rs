//! Triple-Bank Memory Controller.
//!
//! This module stripes the backing store across three independent serial
//! memory banks. Word `w = (addr - base) / 4` lives in bank `w % 3` at bank
//! word `w / 3`, so consecutive words of a cache line land in different
//! banks and are shifted in parallel. Each bank has its own timing model:
//!
//! 1. **Fixed:** every word costs a constant number of cycles.
//! 2. **Serial:** a word costs command, address and data bit times at the
//!    configured clock divider. A sequential continuation inside an open
//!    burst skips the command and address phases.
//!
//! The controller accepts one multi-word request at a time and returns its
//! data in issue order regardless of which bank finished first.

use std::collections::VecDeque;

use crate::common::{BusError, Clock};
use crate::config::{BankTiming, MemoryConfig};
use crate::soc::traits::{BeatResult, BusSlave};
use crate::soc::transaction::{BusTransaction, Direction};

/// Number of banks the store is striped across.
pub const BANKS: usize = 3;

/// Serial command phase length in bits.
const CMD_BITS: u64 = 8;
/// Serial address phase length in bits.
const ADDR_BITS: u64 = 24;
/// Serial data phase length in bits (one word).
const DATA_BITS: u64 = 32;

/// Trait for bank timing models.
pub trait BankTimingModel {
    /// Calculates the latency for one word access at a bank word index.
    ///
    /// # Arguments
    ///
    /// * `bank_word` - Word index inside the bank.
    ///
    /// # Returns
    ///
    /// The latency in core cycles.
    fn access_latency(&mut self, bank_word: u32) -> u64;

    /// Ends the current burst (chip select released).
    fn close(&mut self) {}
}

/// A bank with a fixed per-word latency.
pub struct FixedTiming {
    latency: u64,
}

impl FixedTiming {
    /// Creates a fixed-latency model.
    pub fn new(latency: u64) -> Self {
        Self { latency }
    }
}

impl BankTimingModel for FixedTiming {
    fn access_latency(&mut self, _bank_word: u32) -> u64 {
        self.latency
    }
}

/// A serial (SPI-style) SRAM bank in sequential mode.
///
/// Tracks the word the open burst would continue with. Hitting it costs only
/// the data phase; anything else re-issues command and address.
pub struct SerialTiming {
    divider: u64,
    next_sequential: Option<u32>,
}

impl SerialTiming {
    /// Creates a serial model shifting one bit every `divider` core cycles.
    pub fn new(divider: u64) -> Self {
        Self {
            divider: divider.max(1),
            next_sequential: None,
        }
    }
}

impl BankTimingModel for SerialTiming {
    /// Calculates latency based on burst state.
    ///
    /// * **Continuation:** `DATA_BITS * divider`.
    /// * **New burst:** `(CMD_BITS + ADDR_BITS + DATA_BITS) * divider`.
    fn access_latency(&mut self, bank_word: u32) -> u64 {
        let bits = match self.next_sequential {
            Some(next) if next == bank_word => DATA_BITS,
            _ => CMD_BITS + ADDR_BITS + DATA_BITS,
        };
        self.next_sequential = bank_word.checked_add(1);
        bits * self.divider
    }

    fn close(&mut self) {
        self.next_sequential = None;
    }
}

/// A multi-word request to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemRequest {
    /// Bus address of the first word.
    pub addr: u32,
    /// Transfer direction.
    pub dir: Direction,
    /// Words to transfer.
    pub words: usize,
    /// Write data (`words` entries) for writes.
    pub data: Vec<u32>,
    /// Caller tag echoed in the response.
    pub tag: u64,
}

impl MemRequest {
    /// Builds a read of `words` words at `addr`.
    pub fn read(addr: u32, words: usize, tag: u64) -> Self {
        Self {
            addr,
            dir: Direction::Read,
            words,
            data: Vec::new(),
            tag,
        }
    }

    /// Builds a write of `data` at `addr`.
    pub fn write(addr: u32, data: Vec<u32>, tag: u64) -> Self {
        Self {
            addr,
            dir: Direction::Write,
            words: data.len(),
            data,
            tag,
        }
    }
}

/// Completion of a [`MemRequest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemResponse {
    /// Tag of the completed request.
    pub tag: u64,
    /// Address of the first word.
    pub addr: u32,
    /// Read data in issue order (empty for writes and faults).
    pub data: Vec<u32>,
    /// `Err` for out-of-range accesses.
    pub result: Result<(), BusError>,
}

/// One word operation queued on a bank.
struct BankOp {
    slot: usize,
    bank_word: u32,
    write: Option<u32>,
}

/// One serial memory bank.
struct Bank {
    storage: Vec<u32>,
    timing: Box<dyn BankTimingModel>,
    queue: VecDeque<BankOp>,
    remaining: u64,
}

impl Bank {
    /// Advances the head operation; returns its slot and data when it completes.
    fn tick(&mut self) -> Option<(usize, u32)> {
        let head = self.queue.front()?;
        if self.remaining == 0 {
            self.remaining = self.timing.access_latency(head.bank_word).max(1);
        }
        self.remaining -= 1;
        if self.remaining > 0 {
            return None;
        }

        let op = self.queue.pop_front()?;
        let cell = self.storage.get_mut(op.bank_word as usize)?;
        if let Some(value) = op.write {
            *cell = value;
        }
        let value = *cell;
        if self.queue.is_empty() {
            self.timing.close();
        }
        Some((op.slot, value))
    }
}

/// The request currently being served.
struct ActiveRequest {
    req: MemRequest,
    data: Vec<u32>,
    outstanding: usize,
}

/// Controller striping one address window across three serial banks.
pub struct TripleBankController {
    base: u32,
    bank_words: u32,
    banks: Vec<Bank>,
    active: Option<ActiveRequest>,
    done: Option<MemResponse>,
    /// Single-word request in flight for the bus slave path.
    beat_tag: Option<u64>,
    next_tag: u64,
}

impl TripleBankController {
    /// Creates a controller from the memory configuration.
    pub fn new(config: &MemoryConfig) -> Self {
        let bank_words = config.bank_size / 4;
        let banks = (0..BANKS)
            .map(|_| {
                let timing: Box<dyn BankTimingModel> = match config.timing {
                    BankTiming::Fixed => Box::new(FixedTiming::new(config.fixed_latency)),
                    BankTiming::Serial => Box::new(SerialTiming::new(config.spi_divider)),
                };
                Bank {
                    storage: vec![0; bank_words as usize],
                    timing,
                    queue: VecDeque::new(),
                    remaining: 0,
                }
            })
            .collect();
        Self {
            base: config.base,
            bank_words,
            banks,
            active: None,
            done: None,
            beat_tag: None,
            next_tag: 1 << 63,
        }
    }

    /// Base bus address.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Total capacity in bytes.
    pub fn size(&self) -> u32 {
        self.bank_words * 4 * BANKS as u32
    }

    /// Maps a bus address to (bank, bank word), or `None` if out of range.
    pub fn locate(&self, addr: u32) -> Option<(usize, u32)> {
        let offset = addr.checked_sub(self.base)?;
        let word = offset / 4;
        let bank_word = word / BANKS as u32;
        (bank_word < self.bank_words).then_some(((word % BANKS as u32) as usize, bank_word))
    }

    /// Returns `true` when a new request can be accepted.
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.done.is_none()
    }

    /// Accepts a request.
    ///
    /// # Returns
    ///
    /// The request back if the controller is busy.
    pub fn submit(&mut self, req: MemRequest) -> Result<(), MemRequest> {
        if !self.is_idle() {
            return Err(req);
        }

        let mut plan = Vec::with_capacity(req.words);
        for slot in 0..req.words {
            let addr = req.addr.wrapping_add(slot as u32 * 4);
            match self.locate(addr) {
                Some(loc) => plan.push(loc),
                None => {
                    self.done = Some(MemResponse {
                        tag: req.tag,
                        addr: req.addr,
                        data: Vec::new(),
                        result: Err(BusError::BackingStoreFault(addr)),
                    });
                    return Ok(());
                }
            }
        }

        for (slot, (bank, bank_word)) in plan.into_iter().enumerate() {
            let write = match req.dir {
                Direction::Write => Some(req.data.get(slot).copied().unwrap_or(0)),
                Direction::Read => None,
            };
            self.banks[bank].queue.push_back(BankOp {
                slot,
                bank_word,
                write,
            });
        }
        self.active = Some(ActiveRequest {
            data: vec![0; req.words],
            outstanding: req.words,
            req,
        });
        if req_is_empty(self.active.as_ref()) {
            self.finish();
        }
        Ok(())
    }

    /// Advances every bank by one cycle.
    pub fn tick(&mut self, clk: Clock) {
        if clk.reset {
            for bank in &mut self.banks {
                bank.queue.clear();
                bank.remaining = 0;
                bank.timing.close();
            }
            self.active = None;
            self.done = None;
            self.beat_tag = None;
            return;
        }

        let Some(active) = self.active.as_mut() else {
            return;
        };
        for bank in &mut self.banks {
            if let Some((slot, value)) = bank.tick() {
                active.data[slot] = value;
                active.outstanding -= 1;
            }
        }
        if active.outstanding == 0 {
            self.finish();
        }
    }

    fn finish(&mut self) {
        if let Some(active) = self.active.take() {
            let data = match active.req.dir {
                Direction::Read => active.data,
                Direction::Write => Vec::new(),
            };
            self.done = Some(MemResponse {
                tag: active.req.tag,
                addr: active.req.addr,
                data,
                result: Ok(()),
            });
        }
    }

    /// Takes the completed response, if any.
    pub fn take_response(&mut self) -> Option<MemResponse> {
        self.done.take()
    }

    /// Reads a word without timing.
    pub fn peek_word(&self, addr: u32) -> Option<u32> {
        let (bank, bank_word) = self.locate(addr)?;
        self.banks[bank].storage.get(bank_word as usize).copied()
    }

    /// Writes a word without timing.
    pub fn poke_word(&mut self, addr: u32, value: u32) -> bool {
        let Some((bank, bank_word)) = self.locate(addr) else {
            return false;
        };
        match self.banks[bank].storage.get_mut(bank_word as usize) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// Writes raw bytes starting at `addr` without timing.
    pub fn load_bytes(&mut self, addr: u32, data: &[u8]) -> bool {
        for (i, byte) in data.iter().enumerate() {
            let a = addr.wrapping_add(i as u32);
            let word_addr = a & !3;
            let Some(old) = self.peek_word(word_addr) else {
                return false;
            };
            let shift = (a & 3) * 8;
            let new = (old & !(0xff << shift)) | (u32::from(*byte) << shift);
            self.poke_word(word_addr, new);
        }
        true
    }
}

fn req_is_empty(active: Option<&ActiveRequest>) -> bool {
    active.is_some_and(|a| a.outstanding == 0)
}

/// Direct bus attachment used when the bus cache is disabled.
///
/// Every beat becomes a single-word controller request.
impl BusSlave for TripleBankController {
    fn name(&self) -> &str {
        "SRAM"
    }

    fn address_range(&self) -> (u32, u32) {
        (self.base, self.size())
    }

    fn transfer(&mut self, txn: &BusTransaction, beat: usize, _clk: Clock) -> BeatResult {
        let addr = txn.beat_addr(beat);

        if let Some(tag) = self.beat_tag {
            let Some(resp) = self.done.as_ref() else {
                return BeatResult::Wait;
            };
            if resp.tag != tag {
                return BeatResult::Wait;
            }
            let resp = self.done.take();
            self.beat_tag = None;
            return match resp.map(|r| (r.result, r.data)) {
                Some((Err(err), _)) => BeatResult::Error(err),
                Some((Ok(()), data)) => match txn.dir {
                    Direction::Read => BeatResult::Read(data.first().copied().unwrap_or(0)),
                    Direction::Write => BeatResult::Written,
                },
                None => BeatResult::Wait,
            };
        }

        let tag = self.next_tag;
        let req = match txn.dir {
            Direction::Read => MemRequest::read(addr, 1, tag),
            Direction::Write => {
                MemRequest::write(addr, vec![txn.payload.get(beat).copied().unwrap_or(0)], tag)
            }
        };
        if self.submit(req).is_ok() {
            self.next_tag = self.next_tag.wrapping_add(1);
            self.beat_tag = Some(tag);
        }
        BeatResult::Wait
    }

    fn tick(&mut self, clk: Clock) {
        TripleBankController::tick(self, clk);
    }

    fn load(&mut self, offset: u32, data: &[u8]) -> bool {
        self.load_bytes(self.base.wrapping_add(offset), data)
    }

    fn peek(&self, offset: u32) -> Option<u32> {
        self.peek_word(self.base.wrapping_add(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_config(latency: u64) -> MemoryConfig {
        MemoryConfig {
            base: 0,
            bank_size: 64,
            timing: BankTiming::Fixed,
            fixed_latency: latency,
            spi_divider: 1,
        }
    }

    fn run_until_done(ctrl: &mut TripleBankController) -> (MemResponse, u64) {
        for cycle in 0..10_000 {
            ctrl.tick(Clock::at(cycle));
            if let Some(resp) = ctrl.take_response() {
                return (resp, cycle + 1);
            }
        }
        panic!("controller never completed");
    }

    #[test]
    fn words_stripe_across_banks() {
        let ctrl = TripleBankController::new(&fixed_config(1));
        assert_eq!(ctrl.locate(0x0), Some((0, 0)));
        assert_eq!(ctrl.locate(0x4), Some((1, 0)));
        assert_eq!(ctrl.locate(0x8), Some((2, 0)));
        assert_eq!(ctrl.locate(0xc), Some((0, 1)));
        assert_eq!(ctrl.locate(3 * 64), None);
    }

    #[test]
    fn banks_work_in_parallel() {
        let mut ctrl = TripleBankController::new(&fixed_config(4));
        ctrl.submit(MemRequest::read(0, 3, 7)).unwrap();
        let (resp, cycles) = run_until_done(&mut ctrl);
        assert_eq!(resp.tag, 7);
        assert_eq!(cycles, 4);
    }

    #[test]
    fn data_returns_in_issue_order() {
        let mut ctrl = TripleBankController::new(&fixed_config(2));
        ctrl.submit(MemRequest::write(0x10, vec![1, 2, 3, 4, 5], 0))
            .unwrap();
        run_until_done(&mut ctrl);
        ctrl.submit(MemRequest::read(0x10, 5, 1)).unwrap();
        let (resp, _) = run_until_done(&mut ctrl);
        assert_eq!(resp.data, vec![1, 2, 3, 4, 5]);
        assert_eq!(resp.result, Ok(()));
    }

    #[test]
    fn out_of_range_is_a_fault() {
        let mut ctrl = TripleBankController::new(&fixed_config(1));
        let end = ctrl.size();
        ctrl.submit(MemRequest::read(end - 4, 2, 0)).unwrap();
        let resp = ctrl.take_response().unwrap();
        assert_eq!(resp.result, Err(BusError::BackingStoreFault(end)));
    }

    #[test]
    fn serial_continuation_skips_command_phase() {
        let mut timing = SerialTiming::new(2);
        assert_eq!(timing.access_latency(5), 128);
        assert_eq!(timing.access_latency(6), 64);
        assert_eq!(timing.access_latency(9), 128);
        timing.close();
        assert_eq!(timing.access_latency(10), 128);
    }

    #[test]
    fn busy_controller_rejects_requests() {
        let mut ctrl = TripleBankController::new(&fixed_config(3));
        ctrl.submit(MemRequest::read(0, 1, 0)).unwrap();
        assert!(ctrl.submit(MemRequest::read(4, 1, 1)).is_err());
    }
}
