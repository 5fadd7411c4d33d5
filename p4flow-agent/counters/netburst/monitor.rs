// Overflow monitor: turn counter overflows into samples and re-arm

use p4flow_raw::current_arch::{counter_overflowed, preload_value, Cccr};

use super::catalog::P4_COUNTERS;
use super::topology::Topology;
use crate::enum_with_data;
use crate::error::Result;
use crate::platform::Platform;

enum_with_data! {
    /// Privilege level the interrupted code was running at
    pub enum ExecMode: u8 {
        User => ("user", 0),
        Kernel => ("kernel", 1),
        Hypervisor => ("hypervisor", 2),
    }
    impl value -> u8
}

/// Where the counter interrupt landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptFrame {
    pub ip: u64,
    pub mode: ExecMode,
}

/// Receives one call per overflowed counter. Called from interrupt context,
/// so implementations must not block.
pub trait SampleSink: Send + Sync {
    fn log_event(&self, cpu: u32, ip: u64, mode: ExecMode, counter: usize);
}

/// Scan the owned counters, emit a sample for each one that overflowed and
/// reload it. Returns whether any counter overflowed.
///
/// The PMI vector is unmasked after every scan, whether or not anything
/// overflowed and whether or not the scan itself failed.
pub fn check_ctrs(
    platform: &dyn Platform,
    topology: Topology,
    reset_value: &[u64],
    frame: &InterruptFrame,
    sink: &dyn SampleSink,
) -> Result<bool> {
    let scanned = scan(platform, topology, reset_value, frame, sink);
    platform.unmask_pmi_vector()?;
    scanned
}

fn scan(
    platform: &dyn Platform,
    topology: Topology,
    reset_value: &[u64],
    frame: &InterruptFrame,
    sink: &dyn SampleSink,
) -> Result<bool> {
    let stagger = topology.stagger(platform);
    let cpu = platform.current_cpu();
    let mut handled = false;

    for (virt, &reset) in reset_value.iter().enumerate().take(topology.counter_count()) {
        if reset == 0 {
            continue;
        }

        let slot = &P4_COUNTERS[topology.virt_ctr(stagger, virt)];
        let cccr = Cccr::from_raw(platform.read_msr(slot.cccr)?);
        let ctr = platform.read_msr(slot.counter)?;

        // Either signal alone counts: the CCCR flag is sometimes lost
        if !cccr.overflowed() && !counter_overflowed(ctr) {
            continue;
        }

        sink.log_event(cpu, frame.ip, frame.mode, virt);

        // The first counter write can be dropped by the hardware, so the
        // reload is repeated after the flag is cleared
        let preload = preload_value(reset);
        platform.write_msr(slot.counter, preload)?;
        platform.write_msr(slot.cccr, cccr.without_overflow().raw())?;
        platform.write_msr(slot.counter, preload)?;

        handled = true;
    }

    Ok(handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SimulatedPlatform;
    use p4flow_raw::current_arch::msr;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        samples: Mutex<Vec<(u32, u64, ExecMode, usize)>>,
    }

    impl SampleSink for RecordingSink {
        fn log_event(&self, cpu: u32, ip: u64, mode: ExecMode, counter: usize) {
            self.samples.lock().push((cpu, ip, mode, counter));
        }
    }

    const FRAME: InterruptFrame = InterruptFrame {
        ip: 0xffff_8000_0010_2000,
        mode: ExecMode::Kernel,
    };

    fn resets() -> [u64; 8] {
        [0, 1000, 0, 1000, 0, 0, 0, 0]
    }

    /// Both enabled counters preloaded and still counting
    fn armed() -> SimulatedPlatform {
        let p = SimulatedPlatform::single(3);
        for slot in [&P4_COUNTERS[1], &P4_COUNTERS[3]] {
            p.set_register(slot.cccr, 0x0003_1000);
            p.set_register(slot.counter, preload_value(1000));
        }
        p
    }

    #[test]
    fn test_nothing_pending() {
        let p = armed();
        let sink = RecordingSink::default();

        assert!(!check_ctrs(&p, Topology::NON_HT, &resets(), &FRAME, &sink).unwrap());
        assert!(sink.samples.lock().is_empty());
        assert!(p.writes().is_empty());
        assert_eq!(p.pmi_unmasks(), 1);
    }

    #[test]
    fn test_cccr_flag_overflow() {
        let p = armed();
        p.set_register(msr::IQ_CCCR4, 0x8003_1000);
        let sink = RecordingSink::default();

        assert!(check_ctrs(&p, Topology::NON_HT, &resets(), &FRAME, &sink).unwrap());
        assert_eq!(*sink.samples.lock(), vec![(0, FRAME.ip, ExecMode::Kernel, 3)]);
        assert_eq!(
            p.writes(),
            vec![
                (msr::IQ_PERFCTR4, preload_value(1000)),
                (msr::IQ_CCCR4, 0x0003_1000),
                (msr::IQ_PERFCTR4, preload_value(1000)),
            ]
        );
        assert_eq!(p.pmi_unmasks(), 1);
    }

    #[test]
    fn test_counter_wrap_without_flag() {
        let p = armed();
        p.set_register(msr::MS_PERFCTR0, 0x0000_0000_0000_0010);
        let sink = RecordingSink::default();

        assert!(check_ctrs(&p, Topology::NON_HT, &resets(), &FRAME, &sink).unwrap());
        assert_eq!(sink.samples.lock().len(), 1);
        assert_eq!(sink.samples.lock()[0].3, 1);
        assert_eq!(p.register(msr::MS_PERFCTR0), preload_value(1000));
        assert_eq!(p.writes_to(msr::MS_PERFCTR0).len(), 2);
    }

    #[test]
    fn test_disabled_counters_ignored() {
        let p = armed();
        // Slot 0 looks overflowed but has no reset value
        p.set_register(msr::BPU_CCCR0, 0x8003_0000);
        let sink = RecordingSink::default();

        assert!(!check_ctrs(&p, Topology::NON_HT, &resets(), &FRAME, &sink).unwrap());
        assert!(p.writes().is_empty());
    }

    #[test]
    fn test_repeated_scans_unmask_each_time() {
        let p = armed();
        let sink = RecordingSink::default();
        for _ in 0..3 {
            check_ctrs(&p, Topology::NON_HT, &resets(), &FRAME, &sink).unwrap();
        }
        assert_eq!(p.pmi_unmasks(), 3);
    }
}
