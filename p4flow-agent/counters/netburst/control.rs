// Sampling controller: gate the owned counters through CCCR bit 12

use p4flow_raw::current_arch::Cccr;

use super::catalog::P4_COUNTERS;
use super::topology::Topology;
use crate::error::Result;
use crate::platform::Platform;

/// Enable every virtual counter with a nonzero reset value
pub fn start_ctrs(platform: &dyn Platform, topology: Topology, reset_value: &[u64]) -> Result<()> {
    let stagger = topology.stagger(platform);

    for (virt, &reset) in reset_value.iter().enumerate().take(topology.counter_count()) {
        if reset == 0 {
            continue;
        }
        let addr = P4_COUNTERS[topology.virt_ctr(stagger, virt)].cccr;
        let cccr = Cccr::from_raw(platform.read_msr(addr)?).enabled();
        platform.write_msr(addr, cccr.raw())?;
    }

    Ok(())
}

/// Disable every owned virtual counter, configured or not
pub fn stop_ctrs(platform: &dyn Platform, topology: Topology) -> Result<()> {
    let stagger = topology.stagger(platform);

    for virt in 0..topology.counter_count() {
        let addr = P4_COUNTERS[topology.virt_ctr(stagger, virt)].cccr;
        let cccr = Cccr::from_raw(platform.read_msr(addr)?).disabled();
        platform.write_msr(addr, cccr.raw())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{SimulatedCore, SimulatedPlatform};
    use p4flow_raw::current_arch::{msr, Stagger};

    #[test]
    fn test_start_only_enables_configured() {
        let p = SimulatedPlatform::single(3);
        p.set_register(msr::IQ_CCCR4, 0x0003_A000);

        start_ctrs(&p, Topology::NON_HT, &[0, 0, 0, 500, 0, 0, 0, 0]).unwrap();

        assert_eq!(p.writes(), vec![(msr::IQ_CCCR4, 0x0003_B000)]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let p = SimulatedPlatform::single(3);
        p.set_register(msr::BPU_CCCR0, 0x8003_1000);
        p.set_register(msr::MS_CCCR0, 0x0003_0000);

        stop_ctrs(&p, Topology::NON_HT).unwrap();
        let first = p.core().snapshot();
        stop_ctrs(&p, Topology::NON_HT).unwrap();

        assert_eq!(p.core().snapshot(), first);
        assert_eq!(p.register(msr::BPU_CCCR0), 0x8003_0000);
        assert_eq!(p.register(msr::MS_CCCR0), 0x0003_0000);
        // One write per owned counter on each pass
        assert_eq!(p.writes().len(), 16);
    }

    #[test]
    fn test_start_stop_restores_enable_bits() {
        let p = SimulatedPlatform::single(3);
        // Overflow flag, compare bits and ESCR select must survive the cycle
        p.set_register(msr::BPU_CCCR0, 0x0007_8000);
        p.set_register(msr::MS_CCCR0, 0x0003_0000);
        p.set_register(msr::IQ_CCCR4, 0x8C03_A000);
        p.set_register(msr::IQ_CCCR5, 0x0403_A000);
        let before = p.core().snapshot();

        start_ctrs(&p, Topology::NON_HT, &[100, 0, 0, 500, 0, 0, 0, 7]).unwrap();
        assert!(Cccr::from_raw(p.register(msr::BPU_CCCR0)).is_enabled());
        assert!(Cccr::from_raw(p.register(msr::IQ_CCCR4)).is_enabled());
        assert!(Cccr::from_raw(p.register(msr::IQ_CCCR5)).is_enabled());
        assert!(!Cccr::from_raw(p.register(msr::MS_CCCR0)).is_enabled());

        stop_ctrs(&p, Topology::NON_HT).unwrap();
        for ctr in &P4_COUNTERS {
            assert_eq!(
                p.register(ctr.cccr),
                before.get(&ctr.cccr).copied().unwrap_or(0),
                "cccr {:#x}",
                ctr.cccr
            );
        }
    }

    #[test]
    fn test_odd_sibling_only_touches_its_half() {
        let core = SimulatedCore::new(0, 2, 3);
        let odd = core.thread(1);
        core.set_register(msr::BPU_CCCR0, 1 << 12);

        stop_ctrs(&odd, Topology::HT2).unwrap();
        start_ctrs(&odd, Topology::HT2, &[1, 1, 1, 1]).unwrap();

        let touched: Vec<u64> = odd.writes().iter().map(|(a, _)| *a).collect();
        for addr in touched {
            assert!(P4_COUNTERS[4..].iter().any(|c| c.cccr == addr));
        }
        assert!(Cccr::from_raw(core.register(msr::BPU_CCCR0)).is_enabled());
        assert_eq!(Topology::HT2.stagger(&odd), Stagger::Odd);
    }
}
