//! Save/restore address lists
//!
//! The profiling driver saves every register a logical CPU touches before a
//! session and restores them afterwards. It relies on the list having a fixed
//! length per topology and a fixed order for a given (topology, model,
//! stagger), so both irregular cases below are resolved by padding rather
//! than by changing the length.

use p4flow_raw::current_arch::msr::*;
use p4flow_raw::current_arch::{Stagger, FIRST_MODEL_WITHOUT_IQ_ESCR};

use super::catalog::P4_COUNTERS;
use super::topology::Topology;

/// Inclusive address range of contiguous registers
#[derive(Debug, Clone, Copy)]
pub(crate) struct MsrRange {
    pub first: u64,
    pub last: u64,
}

impl MsrRange {
    const fn new(first: u64, last: u64) -> Self {
        Self { first, last }
    }

    /// This sibling's share: every `stride`-th address from `first + stagger`
    pub(crate) fn strided(self, stagger: Stagger, stride: usize) -> impl Iterator<Item = u64> {
        (self.first + stagger.offset()..=self.last).step_by(stride)
    }
}

pub(crate) const CCCRS: MsrRange = MsrRange::new(BPU_CCCR0, IQ_CCCR5);
/// BSU_ESCR0 up to, not including, IQ_ESCR0
pub(crate) const LOW_ESCRS: MsrRange = MsrRange::new(BSU_ESCR0, IQ_ESCR0 - 1);
pub(crate) const IQ_ESCRS: MsrRange = MsrRange::new(IQ_ESCR0, IQ_ESCR1);
pub(crate) const BSU_ESCRS: MsrRange = MsrRange::new(BSU_ESCR0, BSU_ESCR1);
pub(crate) const RAT_ESCRS: MsrRange = MsrRange::new(RAT_ESCR0, SSU_ESCR0);
pub(crate) const MS_ESCRS: MsrRange = MsrRange::new(MS_ESCR0, TC_ESCR1);
pub(crate) const IX_ESCRS: MsrRange = MsrRange::new(IX_ESCR0, CRU_ESCR3);

/// Older models still implement IQ_ESCR0/1
pub fn has_iq_escrs(model: u8) -> bool {
    model < FIRST_MODEL_WITHOUT_IQ_ESCR
}

/// CRU_ESCR4/5 fall outside every strided range. Setup clears the ones this
/// sibling owns.
pub fn owned_leftover_escrs(topology: Topology, stagger: Stagger) -> &'static [u64] {
    match (topology.is_hyper_threaded(), stagger) {
        (false, _) => &[CRU_ESCR4, CRU_ESCR5],
        (true, Stagger::Even) => &[CRU_ESCR4],
        (true, Stagger::Odd) => &[CRU_ESCR5],
    }
}

/// Leftover ESCRs as they appear in the save list. The odd sibling lists
/// CRU_ESCR5 twice to match the even sibling's slot count.
fn saved_leftover_escrs(topology: Topology, stagger: Stagger) -> &'static [u64] {
    match (topology.is_hyper_threaded(), stagger) {
        (false, _) => &[CRU_ESCR5, CRU_ESCR4],
        (true, Stagger::Even) => &[CRU_ESCR4],
        (true, Stagger::Odd) => &[CRU_ESCR5, CRU_ESCR5],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsrAddresses {
    /// Counter register per virtual counter
    pub counters: Vec<u64>,
    pub cccrs: Vec<u64>,
    pub escrs: Vec<u64>,
}

impl MsrAddresses {
    /// Control registers in save order: CCCRs, then ESCRs
    pub fn controls(&self) -> impl Iterator<Item = u64> + '_ {
        self.cccrs.iter().chain(self.escrs.iter()).copied()
    }
}

pub fn fill_addresses(topology: Topology, model: u8, stagger: Stagger) -> MsrAddresses {
    let stride = topology.address_stride();

    let counters = (0..topology.counter_count())
        .map(|virt| P4_COUNTERS[topology.virt_ctr(stagger, virt)].counter)
        .collect();

    // The 10 CCCRs nobody binds to are saved too
    let cccrs = CCCRS.strided(stagger, stride).collect();

    // No IQ_ESCR0/1 on newer models: save BSU_ESCR0/1 a second time instead
    let quirk = if has_iq_escrs(model) {
        IQ_ESCRS
    } else {
        BSU_ESCRS
    };

    let escrs = [LOW_ESCRS, quirk, RAT_ESCRS, MS_ESCRS, IX_ESCRS]
        .into_iter()
        .flat_map(|range| range.strided(stagger, stride))
        .chain(saved_leftover_escrs(topology, stagger).iter().copied())
        .collect();

    MsrAddresses {
        counters,
        cccrs,
        escrs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const NEW_MODEL: u8 = 0x3;
    const OLD_MODEL: u8 = 0x2;

    fn cases() -> Vec<(Topology, Stagger)> {
        vec![
            (Topology::NON_HT, Stagger::Even),
            (Topology::HT2, Stagger::Even),
            (Topology::HT2, Stagger::Odd),
        ]
    }

    #[test]
    fn test_list_lengths_are_fixed() {
        for model in [OLD_MODEL, NEW_MODEL] {
            for (topo, stag) in cases() {
                let addrs = fill_addresses(topo, model, stag);
                let (ctrs, cccrs, escrs) = if topo.is_hyper_threaded() {
                    (4, 9, 23)
                } else {
                    (8, 18, 45)
                };
                assert_eq!(addrs.counters.len(), ctrs, "{topo:?} {stag:?} model {model}");
                assert_eq!(addrs.cccrs.len(), cccrs, "{topo:?} {stag:?} model {model}");
                assert_eq!(addrs.escrs.len(), escrs, "{topo:?} {stag:?} model {model}");
                assert_eq!(addrs.controls().count(), cccrs + escrs);
            }
        }
    }

    #[test]
    fn test_output_is_deterministic() {
        for (topo, stag) in cases() {
            assert_eq!(
                fill_addresses(topo, NEW_MODEL, stag),
                fill_addresses(topo, NEW_MODEL, stag)
            );
        }
    }

    #[test]
    fn test_leftover_distribution() {
        let non_ht = fill_addresses(Topology::NON_HT, NEW_MODEL, Stagger::Even);
        assert_eq!(non_ht.escrs[43..], [CRU_ESCR5, CRU_ESCR4]);

        let even = fill_addresses(Topology::HT2, NEW_MODEL, Stagger::Even);
        assert_eq!(even.escrs[22], CRU_ESCR4);
        assert!(!even.escrs.contains(&CRU_ESCR5));

        let odd = fill_addresses(Topology::HT2, NEW_MODEL, Stagger::Odd);
        assert_eq!(odd.escrs[21..], [CRU_ESCR5, CRU_ESCR5]);
        assert!(!odd.escrs.contains(&CRU_ESCR4));
    }

    #[test]
    fn test_iq_escr_quirk_keeps_length() {
        let old = fill_addresses(Topology::NON_HT, OLD_MODEL, Stagger::Even);
        assert_eq!(old.escrs[26..28], [IQ_ESCR0, IQ_ESCR1]);

        let new = fill_addresses(Topology::NON_HT, NEW_MODEL, Stagger::Even);
        assert_eq!(new.escrs[26..28], [BSU_ESCR0, BSU_ESCR1]);
        assert!(!new.escrs.contains(&IQ_ESCR0));
        assert!(!new.escrs.contains(&IQ_ESCR1));

        let odd = fill_addresses(Topology::HT2, OLD_MODEL, Stagger::Odd);
        assert_eq!(odd.escrs[13], IQ_ESCR1);
    }

    #[test]
    fn test_siblings_save_disjoint_registers() {
        for model in [OLD_MODEL, NEW_MODEL] {
            let even = fill_addresses(Topology::HT2, model, Stagger::Even);
            let odd = fill_addresses(Topology::HT2, model, Stagger::Odd);

            let even_set: HashSet<u64> = even.controls().collect();
            let odd_set: HashSet<u64> = odd.controls().collect();
            assert!(even_set.is_disjoint(&odd_set));

            assert_eq!(even.counters, vec![0x300, 0x304, 0x308, 0x310]);
            assert_eq!(odd.counters, vec![0x302, 0x306, 0x30A, 0x311]);
        }
    }

    #[test]
    fn test_non_ht_covers_every_escr() {
        let addrs = fill_addresses(Topology::NON_HT, OLD_MODEL, Stagger::Even);
        let unique: HashSet<u64> = addrs.escrs.iter().copied().collect();
        assert_eq!(unique.len(), 45);
        assert_eq!(addrs.cccrs.first(), Some(&BPU_CCCR0));
        assert_eq!(addrs.cccrs.last(), Some(&IQ_CCCR5));
    }
}
