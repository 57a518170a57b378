//! Bus cache and triple-bank controller tests, driven through the bus.

use pretty_assertions::assert_eq;
use rstest::rstest;

use riscv_soc::common::Clock;
use riscv_soc::config::{BankTiming, BusCacheConfig, MemoryConfig, WritePolicy};
use riscv_soc::soc::bus_cache::{BusCache, LineState};
use riscv_soc::soc::memory::TripleBankController;
use riscv_soc::soc::{Bus, BusResponse, BusTransaction};

fn memory_config(timing: BankTiming) -> MemoryConfig {
    MemoryConfig {
        bank_size: 0x1000,
        timing,
        fixed_latency: 2,
        ..MemoryConfig::default()
    }
}

fn bus_cache_config(size: usize, ways: usize, policy: WritePolicy) -> BusCacheConfig {
    BusCacheConfig {
        enabled: true,
        size_bytes: size,
        line_bytes: 16,
        ways,
        write_policy: policy,
    }
}

fn cached_bus(size: usize, ways: usize, policy: WritePolicy) -> Bus {
    let memory = TripleBankController::new(&memory_config(BankTiming::Fixed));
    let mut bus = Bus::new(2);
    bus.add_slave(Box::new(BusCache::new(&bus_cache_config(size, ways, policy), memory)))
        .unwrap();
    bus
}

struct Driver {
    bus: Bus,
    cycle: u64,
    seq: u64,
}

impl Driver {
    fn new(bus: Bus) -> Self {
        Self {
            bus,
            cycle: 0,
            seq: 0,
        }
    }

    fn tick(&mut self) {
        self.bus.tick(Clock::at(self.cycle));
        self.cycle += 1;
    }

    /// One edge with reset asserted.
    fn reset(&mut self) {
        self.bus.tick(Clock {
            cycle: self.cycle,
            reset: true,
        });
        self.cycle += 1;
    }

    fn submit_read(&mut self, master: usize, addr: u32, len: usize) {
        self.bus
            .submit(BusTransaction::read(master, addr, len, self.seq));
        self.seq += 1;
    }

    fn submit_write(&mut self, master: usize, addr: u32, data: Vec<u32>) {
        self.bus
            .submit(BusTransaction::write(master, addr, data, self.seq));
        self.seq += 1;
    }

    /// Ticks until `count` responses arrived, in completion order.
    fn wait_for(&mut self, count: usize) -> Vec<BusResponse> {
        let mut out = Vec::new();
        for _ in 0..10_000 {
            self.tick();
            for m in 0..self.bus.masters() {
                while let Some(r) = self.bus.take_response(m) {
                    out.push(r);
                }
            }
            if out.len() >= count {
                return out;
            }
        }
        panic!("only {} of {} responses arrived", out.len(), count);
    }

    fn read(&mut self, addr: u32, len: usize) -> Vec<u32> {
        self.submit_read(0, addr, len);
        let resp = self.wait_for(1).remove(0);
        assert!(resp.is_ok(), "read {addr:#x} failed: {:?}", resp.result);
        resp.data
    }

    fn write(&mut self, addr: u32, data: Vec<u32>) {
        self.submit_write(0, addr, data);
        let resp = self.wait_for(1).remove(0);
        assert!(resp.is_ok(), "write {addr:#x} failed: {:?}", resp.result);
    }

    fn settle(&mut self) {
        for _ in 0..10_000 {
            if self.cache().is_quiescent() {
                return;
            }
            self.tick();
        }
        panic!("bus cache never drained");
    }

    fn cache(&self) -> &BusCache {
        self.bus.bus_cache().expect("bus cache attached")
    }

    fn memory_word(&self, addr: u32) -> Option<u32> {
        self.cache().memory().peek_word(addr)
    }
}

#[test]
fn read_miss_fills_then_hits() {
    let mut d = Driver::new(cached_bus(256, 2, WritePolicy::WriteBack));
    let image: Vec<u8> = (0u32..8).flat_map(|w| (w * 0x11).to_le_bytes()).collect();
    d.bus.load_binary_at(&image, 0x100).unwrap();

    assert_eq!(d.read(0x100, 4), vec![0x00, 0x11, 0x22, 0x33]);
    assert_eq!(d.read(0x104, 2), vec![0x11, 0x22]);

    let stats = &d.cache().stats;
    assert_eq!(stats.read_misses, 1);
    assert_eq!(stats.fills, 1);
    assert_eq!(stats.read_hits, 6);
}

#[test]
fn write_back_keeps_data_until_flushed() {
    let mut d = Driver::new(cached_bus(256, 2, WritePolicy::WriteBack));
    d.write(0x200, vec![1, 2, 3, 4]);
    d.settle();

    let line = d.cache().line_for(0x200).expect("line allocated");
    assert!(line.valid && line.dirty);
    assert_eq!(line.state, LineState::Idle);
    assert_eq!(d.memory_word(0x204), Some(0));
    assert_eq!(d.bus.peek_u32(0x204), Some(2));

    d.bus.bus_cache_mut().unwrap().flush_all();
    d.settle();
    assert_eq!(d.memory_word(0x204), Some(2));
    assert_eq!(d.cache().stats.flushes, 1);
    assert!(!d.cache().line_for(0x200).unwrap().dirty);
}

#[test]
fn write_through_flushes_once_per_line() {
    let mut d = Driver::new(cached_bus(256, 2, WritePolicy::WriteThrough));
    d.write(0x300, vec![7, 8, 9, 10]);
    d.settle();

    assert_eq!(d.memory_word(0x30c), Some(10));
    assert_eq!(d.cache().stats.flushes, 1);
    assert_eq!(d.cache().stats.write_misses, 1);
    assert_eq!(d.cache().stats.write_hits, 4);
}

#[test]
fn dirty_victim_reaches_memory_before_refill() {
    // 4 sets, direct mapped: 0x000 and 0x040 share set 0
    let mut d = Driver::new(cached_bus(64, 1, WritePolicy::WriteBack));
    d.write(0x000, vec![0xaaaa]);
    assert_eq!(d.memory_word(0x000), Some(0));

    d.bus.load_binary_at(&0x5555u32.to_le_bytes(), 0x040).unwrap();
    assert_eq!(d.read(0x040, 1), vec![0x5555]);

    assert_eq!(d.memory_word(0x000), Some(0xaaaa));
    assert_eq!(d.cache().stats.flushes, 1);
    assert!(d.cache().line_for(0x000).is_none());
    assert_eq!(d.read(0x000, 1), vec![0xaaaa]);
}

#[test]
fn beats_to_a_flushing_line_wait_for_the_flush() {
    let mut d = Driver::new(cached_bus(64, 1, WritePolicy::WriteBack));
    d.write(0x000, vec![0xaaaa]);
    d.settle();

    d.bus.bus_cache_mut().unwrap().flush_all();
    assert_eq!(d.cache().line_for(0x000).unwrap().state, LineState::FlushPending);

    d.submit_read(0, 0x000, 1);
    d.tick();
    assert!(d.bus.take_response(0).is_none());
    assert_eq!(d.cache().line_for(0x000).unwrap().state, LineState::FlushPending);
    assert_eq!(d.cache().stats.read_hits, 0);

    let resp = d.wait_for(1).remove(0);
    assert_eq!(resp.data, vec![0xaaaa]);
    assert_eq!(d.memory_word(0x000), Some(0xaaaa));
    assert_eq!(d.cache().stats.flushes, 1);
    assert_eq!(d.cache().stats.read_hits, 1);
}

#[rstest]
#[case::uncached(false)]
#[case::cached(true)]
fn reset_abandons_the_access_in_flight(#[case] cached: bool) {
    let slow = MemoryConfig {
        fixed_latency: 8,
        ..memory_config(BankTiming::Fixed)
    };
    let memory = TripleBankController::new(&slow);
    let mut bus = Bus::new(1);
    if cached {
        let config = bus_cache_config(256, 2, WritePolicy::WriteBack);
        bus.add_slave(Box::new(BusCache::new(&config, memory))).unwrap();
    } else {
        bus.add_slave(Box::new(memory)).unwrap();
    }
    let mut d = Driver::new(bus);
    let image: Vec<u8> = [0xaaaa_aaaau32, 0xbbbb_bbbb]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect();
    d.bus.load_binary_at(&image, 0x0).unwrap();

    d.submit_read(0, 0x0, 1);
    d.tick();
    d.tick();
    assert!(d.bus.is_busy());

    d.reset();
    assert!(!d.bus.is_busy());
    assert_eq!(d.bus.outstanding(0), 0);
    assert!(d.bus.take_response(0).is_none());

    assert_eq!(d.read(0x4, 1), vec![0xbbbb_bbbb]);
    assert_eq!(d.read(0x0, 1), vec![0xaaaa_aaaa]);
}

#[test]
fn same_line_accesses_follow_grant_order() {
    let mut d = Driver::new(cached_bus(256, 2, WritePolicy::WriteBack));
    d.submit_write(0, 0x400, vec![0x1111, 0x2222]);
    d.submit_read(1, 0x400, 2);

    let responses = d.wait_for(2);
    assert_eq!(responses[0].master, 0);
    assert_eq!(responses[1].master, 1);
    assert_eq!(responses[1].data, vec![0x1111, 0x2222]);
}

#[rstest]
#[case::fixed(BankTiming::Fixed)]
#[case::serial(BankTiming::Serial)]
fn uncached_controller_serves_beats(#[case] timing: BankTiming) {
    let mut bus = Bus::new(1);
    bus.add_slave(Box::new(TripleBankController::new(&memory_config(timing))))
        .unwrap();
    let mut d = Driver::new(bus);

    d.write(0x10, vec![0xdead, 0xbeef, 0xf00d]);
    assert_eq!(d.read(0x10, 3), vec![0xdead, 0xbeef, 0xf00d]);
    assert_eq!(d.bus.peek_u32(0x14), Some(0xbeef));
}

#[test]
fn serial_banks_are_slower_than_fixed() {
    let mut cycles = Vec::new();
    for timing in [BankTiming::Fixed, BankTiming::Serial] {
        let mut bus = Bus::new(1);
        bus.add_slave(Box::new(TripleBankController::new(&memory_config(timing))))
            .unwrap();
        let mut d = Driver::new(bus);
        d.read(0x0, 1);
        cycles.push(d.cycle);
    }
    assert!(cycles[1] > cycles[0], "cycles: {cycles:?}");
}
