use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
use nix::unistd::Pid;

use crate::error::{P4FlowError, Result};

/// Pins the calling thread to one CPU until dropped
pub struct AffinityGuard {
    old_affinity: CpuSet,
}

impl AffinityGuard {
    pub fn new(cpu: i32) -> Result<Self> {
        if cpu < 0 {
            return Err(P4FlowError::AffinityError(format!("Invalid CPU ID: {cpu}")));
        }

        let old_affinity = sched_getaffinity(Pid::from_raw(0))?;

        let mut new_affinity = CpuSet::new();
        new_affinity.set(cpu as usize).map_err(|e| {
            P4FlowError::AffinityError(format!("Failed to set CPU {cpu} in set: {e}"))
        })?;

        sched_setaffinity(Pid::from_raw(0), &new_affinity).map_err(|e| {
            P4FlowError::AffinityError(format!("Failed to set affinity to CPU {cpu}: {e}"))
        })?;

        Ok(Self { old_affinity })
    }
}

impl Drop for AffinityGuard {
    fn drop(&mut self) {
        let _ = sched_setaffinity(Pid::from_raw(0), &self.old_affinity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_cpu_rejected() {
        assert!(matches!(
            AffinityGuard::new(-1),
            Err(P4FlowError::AffinityError(_))
        ));
    }
}
