//! In-memory NetBurst register file
//!
//! Siblings created from the same [`SimulatedCore`] share one register file,
//! the way hyper-threads share their ESCRs and CCCRs. Each thread view keeps
//! its own write log.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use p4flow_raw::current_arch::{
    msr, Cccr, Stagger, MISC_ENABLE_PERF_MON_AVAILABLE, NUM_PHYSICAL_COUNTERS,
};

use crate::error::Result;
use crate::platform::Platform;

type RegisterFile = Arc<Mutex<HashMap<u64, u64>>>;

/// One simulated physical core
#[derive(Clone)]
pub struct SimulatedCore {
    registers: RegisterFile,
    first_cpu: u32,
    threads: u32,
    model: u8,
}

impl SimulatedCore {
    pub fn new(first_cpu: u32, threads: u32, model: u8) -> Self {
        let mut registers = HashMap::new();
        registers.insert(msr::IA32_MISC_ENABLE, MISC_ENABLE_PERF_MON_AVAILABLE);

        Self {
            registers: Arc::new(Mutex::new(registers)),
            first_cpu,
            threads: threads.max(1),
            model,
        }
    }

    /// View of hardware thread `index` of this core
    pub fn thread(&self, index: u32) -> SimulatedPlatform {
        SimulatedPlatform {
            core: self.clone(),
            cpu: AtomicU32::new(self.first_cpu + index),
            writes: Mutex::new(Vec::new()),
            pmi_unmasks: AtomicUsize::new(0),
        }
    }

    pub fn register(&self, addr: u64) -> u64 {
        self.registers.lock().get(&addr).copied().unwrap_or(0)
    }

    pub fn set_register(&self, addr: u64, value: u64) {
        self.registers.lock().insert(addr, value);
    }

    pub fn snapshot(&self) -> HashMap<u64, u64> {
        self.registers.lock().clone()
    }

    /// Count `events` on every enabled counter. Counters that wrap past zero
    /// get their CCCR overflow flag set. Returns how many wrapped.
    pub fn advance(&self, events: u64) -> usize {
        let mut registers = self.registers.lock();
        let mut wrapped = 0;

        for i in 0..NUM_PHYSICAL_COUNTERS as u64 {
            let cccr_addr = msr::BPU_CCCR0 + i;
            let ctr_addr = msr::BPU_PERFCTR0 + i;

            let cccr = Cccr::from_raw(registers.get(&cccr_addr).copied().unwrap_or(0));
            if !cccr.is_enabled() {
                continue;
            }

            let old = registers.get(&ctr_addr).copied().unwrap_or(0);
            let new = old.wrapping_add(events);
            registers.insert(ctr_addr, new);

            if new < old {
                registers.insert(cccr_addr, cccr.raw() | (1 << 31));
                wrapped += 1;
            }
        }

        wrapped
    }
}

/// One logical CPU of a [`SimulatedCore`]
pub struct SimulatedPlatform {
    core: SimulatedCore,
    cpu: AtomicU32,
    writes: Mutex<Vec<(u64, u64)>>,
    pmi_unmasks: AtomicUsize,
}

impl SimulatedPlatform {
    /// Single-threaded core
    pub fn single(model: u8) -> Self {
        SimulatedCore::new(0, 1, model).thread(0)
    }

    /// One thread of a fresh two-thread core
    pub fn hyper_threaded(stagger: Stagger, model: u8) -> Self {
        SimulatedCore::new(0, 2, model).thread(stagger.index() as u32)
    }

    pub fn core(&self) -> &SimulatedCore {
        &self.core
    }

    /// Move the calling "thread" to another logical CPU
    pub fn migrate_to(&self, cpu: u32) {
        self.cpu.store(cpu, Ordering::Relaxed);
    }

    pub fn register(&self, addr: u64) -> u64 {
        self.core.register(addr)
    }

    pub fn set_register(&self, addr: u64, value: u64) {
        self.core.set_register(addr, value);
    }

    /// Every write issued through this view, in order
    pub fn writes(&self) -> Vec<(u64, u64)> {
        self.writes.lock().clone()
    }

    pub fn writes_to(&self, addr: u64) -> Vec<u64> {
        self.writes
            .lock()
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    pub fn pmi_unmasks(&self) -> usize {
        self.pmi_unmasks.load(Ordering::Relaxed)
    }
}

impl Platform for SimulatedPlatform {
    fn read_msr(&self, addr: u64) -> Result<u64> {
        Ok(self.core.register(addr))
    }

    fn write_msr(&self, addr: u64, value: u64) -> Result<()> {
        self.core.set_register(addr, value);
        self.writes.lock().push((addr, value));
        Ok(())
    }

    fn current_cpu(&self) -> u32 {
        self.cpu.load(Ordering::Relaxed)
    }

    fn first_sibling(&self, cpu: u32) -> u32 {
        let core = &self.core;
        if cpu >= core.first_cpu && cpu < core.first_cpu + core.threads {
            core.first_cpu
        } else {
            cpu
        }
    }

    fn siblings_per_core(&self) -> u32 {
        self.core.threads
    }

    fn cpu_model(&self) -> u8 {
        self.core.model
    }

    fn unmask_pmi_vector(&self) -> Result<()> {
        self.pmi_unmasks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
