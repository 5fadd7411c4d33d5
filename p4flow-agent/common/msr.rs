use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::sync::Arc;

use crate::common::affinity::AffinityGuard;
use crate::error::{P4FlowError, Result};

/// `/dev/cpu/N/msr` of one logical CPU
///
/// The MSR number is the file offset. Accesses are pinned to the owning CPU
/// so the thread-lane bits of shared registers are seen from the right
/// sibling.
pub struct MsrHandle {
    file: File,
    cpu: u32,
}

impl MsrHandle {
    pub fn new(cpu: u32) -> Result<Self> {
        let path = format!("/dev/cpu/{cpu}/msr");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| P4FlowError::MsrError(format!("cpu {cpu}: cannot open {path}: {e}")))?;

        tracing::info!("Opened {} for cpu {}", path, cpu);
        Ok(Self { file, cpu })
    }

    pub fn read(&self, addr: u64) -> Result<u64> {
        let _pin = AffinityGuard::new(self.cpu as i32)?;

        let mut raw = [0u8; 8];
        self.file.read_exact_at(&mut raw, addr).map_err(|e| {
            P4FlowError::MsrError(format!("cpu {}: rdmsr {:#x} failed: {}", self.cpu, addr, e))
        })?;

        let value = u64::from_ne_bytes(raw);
        tracing::debug!("cpu {} rdmsr {:#05x} -> {:#018x}", self.cpu, addr, value);
        Ok(value)
    }

    pub fn write(&self, addr: u64, value: u64) -> Result<()> {
        let _pin = AffinityGuard::new(self.cpu as i32)?;

        self.file
            .write_all_at(&value.to_ne_bytes(), addr)
            .map_err(|e| {
                P4FlowError::MsrError(format!(
                    "cpu {}: wrmsr {:#x} <- {:#x} failed: {}",
                    self.cpu, addr, value, e
                ))
            })?;

        tracing::debug!("cpu {} wrmsr {:#05x} <- {:#018x}", self.cpu, addr, value);
        Ok(())
    }

    pub fn cpu_id(&self) -> u32 {
        self.cpu
    }
}

/// Open handles, shared by every session on the same CPU
pub struct Msr {
    handles: Mutex<BTreeMap<u32, Arc<MsrHandle>>>,
}

static MSR: Lazy<Msr> = Lazy::new(|| Msr {
    handles: Mutex::new(BTreeMap::new()),
});

impl Msr {
    pub fn instance() -> &'static Msr {
        &MSR
    }

    pub fn handle(&self, cpu: u32) -> Result<Arc<MsrHandle>> {
        let mut handles = self.handles.lock();
        if let Some(handle) = handles.get(&cpu) {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(MsrHandle::new(cpu)?);
        handles.insert(cpu, Arc::clone(&handle));
        Ok(handle)
    }
}
