// Event configurator: binds one catalog event to one virtual counter

use p4flow_raw::current_arch::{Cccr, Escr};
use p4flow_raw::Register;

use super::catalog::{self, EscrBinding, P4_COUNTERS};
use super::topology::Topology;
use crate::config::CounterConfig;
use crate::error::{P4FlowError, Result};
use crate::platform::Platform;

/// Program the ESCR and CCCR behind virtual counter `virt` for the event in
/// `cfg`. Bad event codes are rejected before any register is touched.
///
/// Both registers are read-modify-write: bits this sibling does not own
/// (reserved bits, the other thread's ESCR lane) keep their current value.
pub fn configure(
    platform: &dyn Platform,
    topology: Topology,
    virt: usize,
    cfg: &CounterConfig,
) -> Result<EscrBinding> {
    let event = catalog::event(cfg.event)?;

    let stagger = topology.stagger(platform);
    let slot = topology.virt_ctr(stagger, virt);
    let counter_bit = 1u8 << slot;

    let binding = *event
        .binding_for(counter_bit)
        .ok_or(P4FlowError::NoBindingAvailable {
            event: cfg.event,
            stagger: stagger as u8,
            counter: virt,
        })?;

    if let Some(note) = event.unverified {
        tracing::warn!(
            "Event {} ({:#x}) uses an unverified mapping: {}",
            event.name,
            cfg.event,
            note
        );
    }

    let escr = Register::new(
        binding.escr,
        Escr::from_raw(platform.read_msr(binding.escr)?)
            .cleared()
            .with_usr(stagger, cfg.user)
            .with_os(stagger, cfg.kernel)
            .with_event_select(event.event_select)
            .with_event_mask(cfg.unit_mask),
    );
    escr.validate()?;
    platform.write_msr(escr.address, escr.to_msr_value())?;

    let cccr_addr = P4_COUNTERS[slot].cccr;
    let cccr = Register::new(
        cccr_addr,
        Cccr::from_raw(platform.read_msr(cccr_addr)?)
            .cleared()
            .with_required_bits()
            .with_escr_select(event.escr_select)
            .with_pmi_on_overflow(stagger),
    );
    cccr.validate()?;
    platform.write_msr(cccr.address, cccr.to_msr_value())?;

    tracing::debug!(
        "{} -> {} (escr {:#x} = {:#x}, cccr {:#x} = {:#x})",
        event.name,
        binding.counter.name(),
        escr.address,
        escr.to_msr_value(),
        cccr.address,
        cccr.to_msr_value()
    );

    Ok(binding)
}
