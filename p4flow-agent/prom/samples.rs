use parking_lot::RwLock;
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::CounterConfig;
use crate::counters::netburst::catalog;
use crate::counters::netburst::{ExecMode, P4Session, SampleSink};
use crate::error::Result;
use crate::metrics::SampleMetric;

/// Prometheus view of every sampling session
pub struct SampleExporter {
    registry: Arc<Registry>,
    samples: IntCounterVec,
    overflow_scans: IntCounterVec,
    active_counters: IntGaugeVec,
    /// Event name per (cpu, virtual counter), filled in after setup
    event_names: RwLock<HashMap<(u32, usize), &'static str>>,
}

impl SampleExporter {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let counter_vec = |metric: SampleMetric| {
            IntCounterVec::new(Opts::new(metric.name(), metric.help()), metric.labels())
        };
        let samples = counter_vec(SampleMetric::Samples)?;
        let overflow_scans = counter_vec(SampleMetric::OverflowScans)?;

        let active = SampleMetric::ActiveCounters;
        let active_counters =
            IntGaugeVec::new(Opts::new(active.name(), active.help()), active.labels())?;

        registry.register(Box::new(samples.clone()))?;
        registry.register(Box::new(overflow_scans.clone()))?;
        registry.register(Box::new(active_counters.clone()))?;

        Ok(Self {
            registry,
            samples,
            overflow_scans,
            active_counters,
            event_names: RwLock::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Record what a freshly set up session ended up counting
    pub fn register_session(&self, cpu: u32, session: &P4Session, configs: &[CounterConfig]) {
        let mut names = self.event_names.write();
        names.retain(|&(c, _), _| c != cpu);

        for (virt, &reset) in session.reset_values().iter().enumerate() {
            if reset == 0 {
                continue;
            }
            let name = configs
                .get(virt)
                .and_then(|cfg| catalog::event(cfg.event).ok())
                .map_or("unknown", |ev| ev.name);
            names.insert((cpu, virt), name);
        }

        self.active_counters
            .with_label_values(&[&cpu.to_string()])
            .set(session.active_counters() as i64);
    }

    pub fn record_scan(&self, cpu: u32, overflowed: bool) {
        if overflowed {
            self.overflow_scans
                .with_label_values(&[&cpu.to_string()])
                .inc();
        }
    }

    pub fn sample_count(&self, cpu: u32, counter: usize, mode: ExecMode) -> u64 {
        let event = self.event_name(cpu, counter);
        self.samples
            .with_label_values(&[&cpu.to_string(), &counter.to_string(), event, mode.name()])
            .get()
    }

    fn event_name(&self, cpu: u32, counter: usize) -> &'static str {
        self.event_names
            .read()
            .get(&(cpu, counter))
            .copied()
            .unwrap_or("unknown")
    }
}

impl SampleSink for SampleExporter {
    fn log_event(&self, cpu: u32, _ip: u64, mode: ExecMode, counter: usize) {
        let event = self.event_name(cpu, counter);
        self.samples
            .with_label_values(&[&cpu.to_string(), &counter.to_string(), event, mode.name()])
            .inc();
    }
}
