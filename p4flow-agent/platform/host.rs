use std::sync::Arc;

use crate::common::msr::{Msr, MsrHandle};
use crate::common::{topology, CPU_ARCH};
use crate::error::{P4FlowError, Result};
use crate::platform::Platform;

/// Linux host access through `/dev/cpu/N/msr`, bound to one logical CPU
pub struct HostPlatform {
    cpu: u32,
    handle: Arc<MsrHandle>,
    siblings: Vec<u32>,
    model: u8,
}

impl HostPlatform {
    pub fn new(cpu: u32) -> Result<Self> {
        let model = CPU_ARCH.netburst_model().ok_or_else(|| {
            P4FlowError::UnsupportedArchitecture(format!(
                "{} CPU has no NetBurst performance counters",
                CPU_ARCH.name()
            ))
        })?;

        let handle = Msr::instance().handle(cpu)?;
        let siblings = topology::thread_siblings(cpu);

        tracing::info!(
            "Host platform for cpu {} (model {:#x}, siblings {:?})",
            cpu,
            model,
            siblings
        );

        Ok(Self {
            cpu,
            handle,
            siblings,
            model,
        })
    }
}

impl Platform for HostPlatform {
    fn read_msr(&self, addr: u64) -> Result<u64> {
        self.handle.read(addr)
    }

    fn write_msr(&self, addr: u64, value: u64) -> Result<()> {
        self.handle.write(addr, value)
    }

    fn current_cpu(&self) -> u32 {
        // Every MSR access is pinned to the handle's CPU
        self.handle.cpu_id()
    }

    fn first_sibling(&self, cpu: u32) -> u32 {
        if cpu == self.cpu {
            self.siblings.iter().copied().min().unwrap_or(cpu)
        } else {
            topology::first_sibling(cpu)
        }
    }

    fn siblings_per_core(&self) -> u32 {
        self.siblings.len() as u32
    }

    fn cpu_model(&self) -> u8 {
        self.model
    }

    fn unmask_pmi_vector(&self) -> Result<()> {
        // The LVT belongs to the kernel; user space polls instead of taking PMIs
        tracing::trace!("cpu {}: PMI vector left to the kernel", self.cpu);
        Ok(())
    }
}
