//! Published counter-model descriptors and the per-CPU session behind them

use p4flow_raw::current_arch::{NUM_ESCRS, NUM_PHYSICAL_COUNTERS};

use super::addresses::{fill_addresses, MsrAddresses};
use super::catalog::NUM_COUNTERS_NON_HT;
use super::topology::{Topology, NUM_COUNTERS_HT2};
use super::monitor::{InterruptFrame, SampleSink};
use super::{control, monitor, setup};
use crate::config::CounterConfig;
use crate::error::Result;
use crate::platform::Platform;

/// Register budget of one logical CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub num_counters: usize,
    pub num_escrs: usize,
    pub num_cccrs: usize,
    /// CCCRs plus ESCRs, the length of the saved control list
    pub num_controls: usize,
}

pub const P4_SPEC: ModelSpec = ModelSpec {
    name: "p4",
    num_counters: NUM_COUNTERS_NON_HT,
    num_escrs: NUM_ESCRS,
    num_cccrs: NUM_PHYSICAL_COUNTERS,
    num_controls: NUM_PHYSICAL_COUNTERS + NUM_ESCRS,
};

pub const P4_HT2_SPEC: ModelSpec = ModelSpec {
    name: "p4-ht2",
    num_counters: NUM_COUNTERS_HT2,
    num_escrs: NUM_ESCRS.div_ceil(2),
    num_cccrs: NUM_PHYSICAL_COUNTERS / 2,
    num_controls: NUM_PHYSICAL_COUNTERS / 2 + NUM_ESCRS.div_ceil(2),
};

impl ModelSpec {
    pub fn for_topology(topology: Topology) -> &'static ModelSpec {
        if topology.is_hyper_threaded() {
            &P4_HT2_SPEC
        } else {
            &P4_SPEC
        }
    }
}

/// What a profiling driver needs from a counter model
pub trait CounterModel {
    fn spec(&self) -> &'static ModelSpec;

    /// Registers to save before and restore after a session
    fn fill_addresses(&self, platform: &dyn Platform) -> MsrAddresses;

    fn setup_ctrs(&mut self, platform: &dyn Platform, configs: &[CounterConfig]) -> Result<()>;

    fn check_ctrs(
        &self,
        platform: &dyn Platform,
        frame: &InterruptFrame,
        sink: &dyn SampleSink,
    ) -> Result<bool>;

    fn start(&self, platform: &dyn Platform) -> Result<()>;

    fn stop(&self, platform: &dyn Platform) -> Result<()>;
}

/// Counter state of one logical CPU
///
/// The topology is fixed when the session is created. The stagger is not
/// stored: every operation asks the platform which sibling it runs on.
#[derive(Debug, Clone)]
pub struct P4Session {
    topology: Topology,
    reset_value: [u64; NUM_COUNTERS_NON_HT],
}

impl P4Session {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            reset_value: [0; NUM_COUNTERS_NON_HT],
        }
    }

    pub fn detect(platform: &dyn Platform) -> Self {
        Self::new(Topology::detect(platform))
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn reset_values(&self) -> &[u64] {
        &self.reset_value[..self.topology.counter_count()]
    }

    pub fn active_counters(&self) -> usize {
        self.reset_values().iter().filter(|&&r| r != 0).count()
    }
}

impl CounterModel for P4Session {
    fn spec(&self) -> &'static ModelSpec {
        ModelSpec::for_topology(self.topology)
    }

    fn fill_addresses(&self, platform: &dyn Platform) -> MsrAddresses {
        fill_addresses(
            self.topology,
            platform.cpu_model(),
            self.topology.stagger(platform),
        )
    }

    fn setup_ctrs(&mut self, platform: &dyn Platform, configs: &[CounterConfig]) -> Result<()> {
        let counters = self.topology.counter_count();
        let result = setup::setup_ctrs(
            platform,
            self.topology,
            configs,
            &mut self.reset_value[..counters],
        );
        if result.is_err() {
            self.reset_value = [0; NUM_COUNTERS_NON_HT];
        }
        result
    }

    fn check_ctrs(
        &self,
        platform: &dyn Platform,
        frame: &InterruptFrame,
        sink: &dyn SampleSink,
    ) -> Result<bool> {
        monitor::check_ctrs(platform, self.topology, self.reset_values(), frame, sink)
    }

    fn start(&self, platform: &dyn Platform) -> Result<()> {
        control::start_ctrs(platform, self.topology, self.reset_values())
    }

    fn stop(&self, platform: &dyn Platform) -> Result<()> {
        control::stop_ctrs(platform, self.topology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::netburst::monitor::ExecMode;
    use crate::platform::{SimulatedCore, SimulatedPlatform};
    use p4flow_raw::current_arch::{msr, Cccr};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        samples: Mutex<Vec<(u32, usize)>>,
    }

    impl SampleSink for RecordingSink {
        fn log_event(&self, cpu: u32, _ip: u64, _mode: ExecMode, counter: usize) {
            self.samples.lock().push((cpu, counter));
        }
    }

    const FRAME: InterruptFrame = InterruptFrame {
        ip: 0,
        mode: ExecMode::Hypervisor,
    };

    #[test]
    fn test_published_descriptors() {
        assert_eq!(
            (P4_SPEC.num_counters, P4_SPEC.num_escrs, P4_SPEC.num_cccrs, P4_SPEC.num_controls),
            (8, 45, 18, 63)
        );
        assert_eq!(
            (
                P4_HT2_SPEC.num_counters,
                P4_HT2_SPEC.num_escrs,
                P4_HT2_SPEC.num_cccrs,
                P4_HT2_SPEC.num_controls
            ),
            (4, 23, 9, 32)
        );
    }

    #[test]
    fn test_address_lists_match_descriptor() {
        for threads in [1, 2] {
            for thread in 0..threads {
                for model in [2, 3] {
                    let p = SimulatedCore::new(0, threads, model).thread(thread);
                    let session = P4Session::detect(&p);
                    let spec = session.spec();
                    let addrs = session.fill_addresses(&p);

                    assert_eq!(addrs.counters.len(), spec.num_counters);
                    assert_eq!(addrs.escrs.len(), spec.num_escrs);
                    assert_eq!(addrs.cccrs.len(), spec.num_cccrs);
                    assert_eq!(addrs.controls().count(), spec.num_controls);
                }
            }
        }
    }

    #[test]
    fn test_failed_setup_leaves_session_idle() {
        let p = SimulatedPlatform::single(3);
        let mut session = P4Session::detect(&p);
        session.setup_ctrs(&p, &[CounterConfig::new(35, 100)]).unwrap();
        assert_eq!(session.active_counters(), 0);

        let mut configs = vec![CounterConfig::default(); 3];
        configs.push(CounterConfig::new(35, 100));
        session.setup_ctrs(&p, &configs).unwrap();
        assert_eq!(session.active_counters(), 1);

        p.set_register(msr::IA32_MISC_ENABLE, 0);
        assert!(session.setup_ctrs(&p, &configs).is_err());
        assert_eq!(session.active_counters(), 0);
    }

    #[test]
    fn test_sampling_cycle() {
        let p = SimulatedPlatform::single(3);
        let mut session = P4Session::detect(&p);
        let mut configs = vec![CounterConfig::default(); 8];
        configs[3] = CounterConfig::new(35, 100);
        session.setup_ctrs(&p, &configs).unwrap();
        session.start(&p).unwrap();

        let sink = RecordingSink::default();
        p.core().advance(99);
        assert!(!session.check_ctrs(&p, &FRAME, &sink).unwrap());

        p.core().advance(2);
        assert!(session.check_ctrs(&p, &FRAME, &sink).unwrap());
        assert_eq!(*sink.samples.lock(), vec![(0, 3)]);
        assert_eq!(p.register(msr::IQ_PERFCTR4), (-100i64) as u64);

        session.stop(&p).unwrap();
        assert_eq!(p.core().advance(1000), 0);
    }

    #[test]
    fn test_ht_siblings_share_a_core() {
        let core = SimulatedCore::new(0, 2, 3);
        let even = core.thread(0);
        let odd = core.thread(1);

        let mut configs = vec![CounterConfig::default(); 4];
        configs[3] = CounterConfig::new(35, 100);
        let mut even_session = P4Session::detect(&even);
        even_session.setup_ctrs(&even, &configs).unwrap();
        let even_escr = core.register(msr::CRU_ESCR0);

        configs[3] = CounterConfig::new(35, 50);
        let mut odd_session = P4Session::detect(&odd);
        odd_session.setup_ctrs(&odd, &configs).unwrap();

        // The odd setup left the even sibling's programming alone
        assert_eq!(core.register(msr::CRU_ESCR0), even_escr);
        assert_ne!(core.register(msr::CRU_ESCR1), 0);

        even_session.start(&even).unwrap();
        odd_session.start(&odd).unwrap();
        assert!(Cccr::from_raw(core.register(msr::IQ_CCCR4)).is_enabled());
        assert!(Cccr::from_raw(core.register(msr::IQ_CCCR5)).is_enabled());

        core.advance(60);

        let even_sink = RecordingSink::default();
        let odd_sink = RecordingSink::default();
        assert!(!even_session.check_ctrs(&even, &FRAME, &even_sink).unwrap());
        assert!(odd_session.check_ctrs(&odd, &FRAME, &odd_sink).unwrap());
        assert!(even_sink.samples.lock().is_empty());
        assert_eq!(*odd_sink.samples.lock(), vec![(1, 3)]);

        odd_session.stop(&odd).unwrap();
        assert!(Cccr::from_raw(core.register(msr::IQ_CCCR4)).is_enabled());
        assert!(!Cccr::from_raw(core.register(msr::IQ_CCCR5)).is_enabled());
    }
}
