// Setup sequence: clear this sibling's half of the PMU, then program and
// preload each configured virtual counter

use p4flow_raw::current_arch::msr::{IA32_MISC_ENABLE, IQ_ESCR0, IQ_ESCR1};
use p4flow_raw::current_arch::{perf_monitoring_available, preload_value, Cccr};

use super::addresses::{
    has_iq_escrs, owned_leftover_escrs, IX_ESCRS, LOW_ESCRS, MS_ESCRS, RAT_ESCRS,
};
use super::catalog::{P4_COUNTERS, UNUSED_CCCRS};
use super::events;
use super::topology::Topology;
use crate::config::CounterConfig;
use crate::error::{P4FlowError, Result};
use crate::platform::Platform;

fn clear_cccr(platform: &dyn Platform, addr: u64) -> Result<()> {
    let cccr = Cccr::from_raw(platform.read_msr(addr)?)
        .cleared()
        .with_required_bits();
    platform.write_msr(addr, cccr.raw())
}

/// Bring the calling CPU's counters into a known state and program them
/// from `configs` (one entry per virtual counter, missing entries disabled).
///
/// `reset_value` receives the sampling interval of every virtual counter
/// that ends up armed and zero for the rest. Siblings must not run this
/// concurrently: both write into the shared register file.
pub fn setup_ctrs(
    platform: &dyn Platform,
    topology: Topology,
    configs: &[CounterConfig],
    reset_value: &mut [u64],
) -> Result<()> {
    let cpu = platform.current_cpu();

    let misc_enable = platform.read_msr(IA32_MISC_ENABLE)?;
    if !perf_monitoring_available(misc_enable) {
        tracing::error!("P4 PMC not available on cpu {}", cpu);
        return Err(P4FlowError::PerformanceMonitoringUnavailable);
    }

    let stagger = topology.stagger(platform);
    let stride = topology.address_stride();
    let counters = topology.counter_count();

    for virt in 0..counters {
        clear_cccr(platform, P4_COUNTERS[topology.virt_ctr(stagger, virt)].cccr)?;
    }

    for &addr in UNUSED_CCCRS.iter().skip(stagger.index()).step_by(stride) {
        clear_cccr(platform, addr)?;
    }

    for addr in LOW_ESCRS.strided(stagger, stride) {
        platform.write_msr(addr, 0)?;
    }

    // Both IQ ESCRs, whichever sibling we are
    if has_iq_escrs(platform.cpu_model()) {
        platform.write_msr(IQ_ESCR0, 0)?;
        platform.write_msr(IQ_ESCR1, 0)?;
    }

    for range in [RAT_ESCRS, MS_ESCRS, IX_ESCRS] {
        for addr in range.strided(stagger, stride) {
            platform.write_msr(addr, 0)?;
        }
    }

    for &addr in owned_leftover_escrs(topology, stagger) {
        platform.write_msr(addr, 0)?;
    }

    for (virt, reset) in reset_value.iter_mut().enumerate().take(counters) {
        *reset = 0;

        let Some(cfg) = configs.get(virt).filter(|cfg| cfg.enabled) else {
            continue;
        };

        if cfg.count == 0 {
            tracing::warn!("cpu {} counter {}: count 0 leaves it disabled", cpu, virt);
            continue;
        }

        match events::configure(platform, topology, virt, cfg) {
            Ok(_) => {}
            Err(
                e @ (P4FlowError::InvalidEventCode(_) | P4FlowError::NoBindingAvailable { .. }),
            ) => {
                tracing::error!("cpu {} counter {}: {}", cpu, virt, e);
                continue;
            }
            Err(e) => return Err(e),
        }

        *reset = cfg.count;
        let ctr = P4_COUNTERS[topology.virt_ctr(stagger, virt)].counter;
        platform.write_msr(ctr, preload_value(cfg.count))?;
    }

    tracing::info!(
        "cpu {} ({:?}): {} of {} counters armed",
        cpu,
        stagger,
        reset_value.iter().take(counters).filter(|&&r| r != 0).count(),
        counters
    );

    Ok(())
}
