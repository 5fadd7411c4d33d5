// Stagger / counter-count resolution for hyper-threaded NetBurst cores

use p4flow_raw::current_arch::Stagger;

use super::catalog::NUM_COUNTERS_NON_HT;
use crate::platform::Platform;

/// Virtual counters per logical CPU on a two-thread core
pub const NUM_COUNTERS_HT2: usize = 4;

/// Counter split chosen for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    hyper_threaded: bool,
}

impl Topology {
    pub const NON_HT: Topology = Topology {
        hyper_threaded: false,
    };
    pub const HT2: Topology = Topology {
        hyper_threaded: true,
    };

    /// Only a two-thread core splits the counters
    pub fn from_siblings(siblings: u32) -> Self {
        Self {
            hyper_threaded: siblings == 2,
        }
    }

    pub fn detect(platform: &dyn Platform) -> Self {
        Self::from_siblings(platform.siblings_per_core())
    }

    pub fn is_hyper_threaded(&self) -> bool {
        self.hyper_threaded
    }

    /// 4 on a hyper-threaded core, 8 otherwise
    pub fn counter_count(&self) -> usize {
        if self.hyper_threaded {
            NUM_COUNTERS_HT2
        } else {
            NUM_COUNTERS_NON_HT
        }
    }

    /// 2 on a hyper-threaded core so the siblings interleave, 1 otherwise
    pub fn address_stride(&self) -> usize {
        if self.hyper_threaded {
            2
        } else {
            1
        }
    }

    /// Stagger of the calling CPU; a core without the 2-way split only has
    /// the even half
    pub fn stagger(&self, platform: &dyn Platform) -> Stagger {
        if self.hyper_threaded {
            stagger(platform)
        } else {
            Stagger::Even
        }
    }

    /// Catalog slot backing virtual counter `virt` for this sibling
    pub fn virt_ctr(&self, stagger: Stagger, virt: usize) -> usize {
        let slot = virt + self.counter_count() * stagger.index();
        debug_assert!(
            slot < NUM_COUNTERS_NON_HT,
            "virtual counter {virt} maps outside the catalog"
        );
        slot
    }
}

/// Resolved on every call: the caller may have migrated since the last one
pub fn stagger(platform: &dyn Platform) -> Stagger {
    let cpu = platform.current_cpu();
    if cpu == platform.first_sibling(cpu) {
        Stagger::Even
    } else {
        Stagger::Odd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{SimulatedCore, SimulatedPlatform};

    #[test]
    fn test_counter_split() {
        assert_eq!(Topology::from_siblings(1).counter_count(), 8);
        assert_eq!(Topology::from_siblings(2).counter_count(), 4);
        assert_eq!(Topology::from_siblings(1).address_stride(), 1);
        assert_eq!(Topology::from_siblings(2).address_stride(), 2);
        // Anything but exactly two threads keeps the full counter set
        assert_eq!(Topology::from_siblings(4), Topology::NON_HT);
    }

    #[test]
    fn test_virt_ctr_stays_in_catalog() {
        for topo in [Topology::NON_HT, Topology::HT2] {
            let staggers: &[Stagger] = if topo.is_hyper_threaded() {
                &[Stagger::Even, Stagger::Odd]
            } else {
                &[Stagger::Even]
            };
            for &stag in staggers {
                for virt in 0..topo.counter_count() {
                    assert!(topo.virt_ctr(stag, virt) < NUM_COUNTERS_NON_HT);
                }
            }
        }
        assert_eq!(Topology::HT2.virt_ctr(Stagger::Odd, 0), 4);
        assert_eq!(Topology::HT2.virt_ctr(Stagger::Odd, 3), 7);
    }

    #[test]
    fn test_stagger_follows_current_cpu() {
        let core = SimulatedCore::new(2, 2, 3);
        let p = core.thread(0);
        assert_eq!(stagger(&p), Stagger::Even);

        p.migrate_to(3);
        assert_eq!(stagger(&p), Stagger::Odd);

        assert_eq!(stagger(&SimulatedPlatform::single(3)), Stagger::Even);
        assert_eq!(
            Topology::detect(&SimulatedPlatform::hyper_threaded(Stagger::Odd, 3)),
            Topology::HT2
        );
    }

    #[test]
    fn test_non_ht_topology_pins_even_half() {
        let core = SimulatedCore::new(0, 4, 3);
        let p = core.thread(1);
        assert_eq!(stagger(&p), Stagger::Odd);

        let topo = Topology::detect(&p);
        assert_eq!(topo, Topology::NON_HT);
        assert_eq!(topo.stagger(&p), Stagger::Even);
    }
}
