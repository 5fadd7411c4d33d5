// Sampling orchestrator
// Sets up one session per CPU, then polls every session for overflows in a
// single async loop until cancelled

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::CounterConfig;
use crate::counters::netburst::{CounterModel, ExecMode, InterruptFrame, P4Session};
use crate::error::{P4FlowError, Result};
use crate::platform::{HostPlatform, Platform, SimulatedCore};
use crate::prom::SampleExporter;

/// Polled scans have no interrupted context; samples are attributed to the
/// agent itself
const POLL_FRAME: InterruptFrame = InterruptFrame {
    ip: 0,
    mode: ExecMode::Hypervisor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Real counters through `/dev/cpu/N/msr`
    Host,
    /// In-memory cores that advance every enabled counter by
    /// `events_per_tick` before each poll
    Simulated {
        threads_per_core: u32,
        model: u8,
        events_per_tick: u64,
    },
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub cpus: Vec<u32>,
    pub counters: Vec<CounterConfig>,
    pub interval: Duration,
    pub backend: Backend,
}

struct CpuSession {
    cpu: u32,
    platform: Arc<dyn Platform>,
    session: Mutex<P4Session>,
}

pub struct Sampler {
    sessions: Vec<CpuSession>,
    sim_cores: Vec<(SimulatedCore, u64)>,
    exporter: Arc<SampleExporter>,
    interval: Duration,
}

impl Sampler {
    /// Set up every CPU in ascending order. Siblings share registers, so
    /// setup is never run for two CPUs at once.
    pub fn new(config: SamplerConfig, exporter: Arc<SampleExporter>) -> Result<Self> {
        let mut cpus = config.cpus.clone();
        cpus.sort_unstable();
        cpus.dedup();

        let (platforms, sim_cores) = Self::platforms(&cpus, config.backend)?;

        let mut sessions = Vec::new();
        for (cpu, platform) in platforms {
            let mut session = P4Session::detect(platform.as_ref());

            if let Err(e) = session.setup_ctrs(platform.as_ref(), &config.counters) {
                tracing::error!("Skipping cpu {}: {}", cpu, e);
                continue;
            }

            tracing::info!(
                "cpu {}: {} session, {} counter(s) armed",
                cpu,
                session.spec().name,
                session.active_counters()
            );
            exporter.register_session(cpu, &session, &config.counters);

            sessions.push(CpuSession {
                cpu,
                platform,
                session: Mutex::new(session),
            });
        }

        if sessions.is_empty() {
            return Err(P4FlowError::ConfigError(
                "No CPU could be set up for sampling".to_string(),
            ));
        }

        Ok(Self {
            sessions,
            sim_cores,
            exporter,
            interval: config.interval,
        })
    }

    #[allow(clippy::type_complexity)]
    fn platforms(
        cpus: &[u32],
        backend: Backend,
    ) -> Result<(Vec<(u32, Arc<dyn Platform>)>, Vec<(SimulatedCore, u64)>)> {
        match backend {
            Backend::Host => {
                let mut platforms: Vec<(u32, Arc<dyn Platform>)> = Vec::new();
                for &cpu in cpus {
                    let platform: Arc<dyn Platform> = Arc::new(HostPlatform::new(cpu)?);
                    platforms.push((cpu, platform));
                }
                Ok((platforms, Vec::new()))
            }
            Backend::Simulated {
                threads_per_core,
                model,
                events_per_tick,
            } => {
                let threads = threads_per_core.max(1);
                let mut cores: BTreeMap<u32, SimulatedCore> = BTreeMap::new();
                let mut platforms: Vec<(u32, Arc<dyn Platform>)> = Vec::new();

                for &cpu in cpus {
                    let first = cpu - cpu % threads;
                    let core = cores
                        .entry(first)
                        .or_insert_with(|| SimulatedCore::new(first, threads, model));
                    let platform: Arc<dyn Platform> = Arc::new(core.thread(cpu - first));
                    platforms.push((cpu, platform));
                }

                tracing::info!(
                    "Simulating {} core(s), {} thread(s) each, model {:#x}",
                    cores.len(),
                    threads,
                    model
                );

                let sim_cores = cores
                    .into_values()
                    .map(|core| (core, events_per_tick))
                    .collect();
                Ok((platforms, sim_cores))
            }
        }
    }

    pub fn cpus(&self) -> Vec<u32> {
        self.sessions.iter().map(|s| s.cpu).collect()
    }

    /// Enable counters and spawn the polling loop. If any CPU fails to
    /// start, every CPU is stopped again before the error is returned.
    pub fn start(self, cancel_token: CancellationToken) -> Result<JoinHandle<()>> {
        for s in &self.sessions {
            let started = s.session.lock().start(s.platform.as_ref());
            if let Err(e) = started {
                tracing::error!("Failed to start counters on cpu {}: {}", s.cpu, e);
                self.stop_all();
                return Err(e);
            }
        }
        tracing::warn!(
            "Sampling started on {} cpu(s), polling every {:?}",
            self.sessions.len(),
            self.interval
        );

        Ok(tokio::spawn(async move {
            self.sampling_loop(cancel_token).await;
        }))
    }

    async fn sampling_loop(self, cancel_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::info!("Sampling loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.poll_once();
                }
            }
        }

        self.stop_all();
    }

    /// One overflow scan over every CPU. Returns the number of CPUs that had
    /// at least one overflow.
    pub fn poll_once(&self) -> usize {
        for (core, events) in &self.sim_cores {
            core.advance(*events);
        }

        let mut overflowed = 0;
        for s in &self.sessions {
            let session = s.session.lock();
            match session.check_ctrs(s.platform.as_ref(), &POLL_FRAME, self.exporter.as_ref()) {
                Ok(hit) => {
                    self.exporter.record_scan(s.cpu, hit);
                    if hit {
                        overflowed += 1;
                    }
                }
                Err(e) => tracing::error!("Overflow scan failed on cpu {}: {}", s.cpu, e),
            }
        }
        overflowed
    }

    pub fn stop_all(&self) {
        for s in &self.sessions {
            if let Err(e) = s.session.lock().stop(s.platform.as_ref()) {
                tracing::error!("Failed to stop counters on cpu {}: {}", s.cpu, e);
            }
        }
        tracing::info!("Counters stopped on {} cpu(s)", self.sessions.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SimulatedPlatform;
    use p4flow_raw::current_arch::{msr, Cccr};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn simulated(cpus: Vec<u32>, counters: Vec<CounterConfig>, threads: u32) -> SamplerConfig {
        SamplerConfig {
            cpus,
            counters,
            interval: Duration::from_millis(5),
            backend: Backend::Simulated {
                threads_per_core: threads,
                model: 3,
                events_per_tick: 600,
            },
        }
    }

    fn iq_counter(count: u64) -> Vec<CounterConfig> {
        let mut counters = vec![CounterConfig::default(); 3];
        counters.push(CounterConfig::new(35, count));
        counters
    }

    #[test]
    fn test_simulated_ht_pair() {
        let exporter = Arc::new(SampleExporter::new().unwrap());
        let sampler =
            Sampler::new(simulated(vec![1, 0], iq_counter(1000), 2), exporter.clone()).unwrap();
        assert_eq!(sampler.cpus(), vec![0, 1]);

        for s in &sampler.sessions {
            s.session.lock().start(s.platform.as_ref()).unwrap();
        }

        // 600 events per tick against an interval of 1000
        assert_eq!(sampler.poll_once(), 0);
        assert_eq!(sampler.poll_once(), 2);
        assert_eq!(exporter.sample_count(0, 3, ExecMode::Hypervisor), 1);
        assert_eq!(exporter.sample_count(1, 3, ExecMode::Hypervisor), 1);

        sampler.stop_all();
        assert_eq!(sampler.sim_cores[0].0.advance(10_000), 0);
    }

    #[test]
    fn test_unbindable_config_still_sets_up() {
        // Event 1 has no binding on virtual counter 0; the CPU stays usable
        let exporter = Arc::new(SampleExporter::new().unwrap());
        let sampler = Sampler::new(
            simulated(vec![0], vec![CounterConfig::new(1, 100)], 1),
            exporter,
        )
        .unwrap();
        assert_eq!(sampler.sessions[0].session.lock().active_counters(), 0);
        assert_eq!(sampler.poll_once(), 0);
    }

    /// Accepts writes until `refuse` is set, then rejects CCCR writes
    struct RefusingPlatform {
        inner: SimulatedPlatform,
        refuse: AtomicBool,
    }

    impl Platform for RefusingPlatform {
        fn read_msr(&self, addr: u64) -> Result<u64> {
            self.inner.read_msr(addr)
        }

        fn write_msr(&self, addr: u64, value: u64) -> Result<()> {
            if self.refuse.load(Ordering::Relaxed) && (0x360..=0x371).contains(&addr) {
                return Err(P4FlowError::MsrError(format!("wrmsr {addr:#x} refused")));
            }
            self.inner.write_msr(addr, value)
        }

        fn current_cpu(&self) -> u32 {
            self.inner.current_cpu()
        }

        fn first_sibling(&self, cpu: u32) -> u32 {
            self.inner.first_sibling(cpu)
        }

        fn siblings_per_core(&self) -> u32 {
            self.inner.siblings_per_core()
        }

        fn cpu_model(&self) -> u8 {
            self.inner.cpu_model()
        }

        fn unmask_pmi_vector(&self) -> Result<()> {
            self.inner.unmask_pmi_vector()
        }
    }

    fn armed_session(platform: &dyn Platform, counters: &[CounterConfig]) -> Mutex<P4Session> {
        let mut session = P4Session::detect(platform);
        session.setup_ctrs(platform, counters).unwrap();
        Mutex::new(session)
    }

    #[test]
    fn test_failed_start_stops_started_cpus() {
        let counters = iq_counter(1000);
        let good = Arc::new(SimulatedPlatform::single(3));
        let bad = Arc::new(RefusingPlatform {
            inner: SimulatedCore::new(1, 1, 3).thread(0),
            refuse: AtomicBool::new(false),
        });

        let sessions = vec![
            CpuSession {
                cpu: 0,
                session: armed_session(good.as_ref(), &counters),
                platform: good.clone(),
            },
            CpuSession {
                cpu: 1,
                session: armed_session(bad.as_ref(), &counters),
                platform: bad.clone(),
            },
        ];
        bad.refuse.store(true, Ordering::Relaxed);
        good.clear_writes();

        let sampler = Sampler {
            sessions,
            sim_cores: Vec::new(),
            exporter: Arc::new(SampleExporter::new().unwrap()),
            interval: Duration::from_millis(5),
        };
        assert!(matches!(
            sampler.start(CancellationToken::new()),
            Err(P4FlowError::MsrError(_))
        ));

        // cpu 0 was enabled, then stopped again
        let iq4 = good.writes_to(msr::IQ_CCCR4);
        assert_eq!(iq4.len(), 2);
        assert!(Cccr::from_raw(iq4[0]).is_enabled());
        assert!(!Cccr::from_raw(good.register(msr::IQ_CCCR4)).is_enabled());
    }

    #[tokio::test]
    async fn test_loop_stops_on_cancel() {
        let exporter = Arc::new(SampleExporter::new().unwrap());
        let sampler = Sampler::new(simulated(vec![0], iq_counter(100), 1), exporter.clone()).unwrap();

        let cancel = CancellationToken::new();
        let handle = sampler.start(cancel.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(exporter.sample_count(0, 3, ExecMode::Hypervisor) > 0);
    }
}
