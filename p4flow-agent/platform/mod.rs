//! Hardware seam for the NetBurst counter model
//!
//! Everything the model needs from the machine goes through [`Platform`]:
//! 64-bit MSR access, the identity of the calling logical CPU, sibling
//! topology, the CPU model number, and re-arming of the counter interrupt.

pub mod host;
pub mod sim;

pub use host::HostPlatform;
pub use sim::{SimulatedCore, SimulatedPlatform};

use crate::error::Result;

pub trait Platform: Send + Sync {
    fn read_msr(&self, addr: u64) -> Result<u64>;

    fn write_msr(&self, addr: u64, value: u64) -> Result<()>;

    /// Logical CPU the caller is executing on right now
    fn current_cpu(&self) -> u32;

    /// Lowest-numbered logical CPU sharing a core with `cpu`
    fn first_sibling(&self, cpu: u32) -> u32;

    /// Hardware threads per core
    fn siblings_per_core(&self) -> u32;

    /// CPUID model number
    fn cpu_model(&self) -> u8;

    /// Clear the mask bit of the local APIC performance-counter LVT entry.
    /// NetBurst masks it on every delivery.
    fn unmask_pmi_vector(&self) -> Result<()>;
}
