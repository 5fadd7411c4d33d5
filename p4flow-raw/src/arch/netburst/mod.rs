//! Intel NetBurst (Pentium 4) performance-monitoring register definitions
//!
//! ## Register Groups
//!
//! - **PERFCTR** - 18 40-bit counters, 0x300-0x311
//! - **CCCR** - one Counter Configuration Control Register per counter, 0x360-0x371
//! - **ESCR** - 45 Event Selection Control Registers, scattered over 0x3A0-0x3E1
//!
//! On a hyper-threaded core the two logical CPUs share all three groups.
//! Each sibling owns one "stagger" half: even or odd addresses of the
//! contiguous ESCR/CCCR ranges, and its own lane of bits inside every ESCR
//! and CCCR.
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 3B,
//!   "Performance Monitoring (Processors Based on Intel NetBurst Microarchitecture)"
//! - Intel® Pentium® 4 Processor Specification Update, erratum N15

pub mod cccr;
pub mod counter;
pub mod escr;

pub use cccr::Cccr;
pub use counter::{counter_overflowed, preload_value};
pub use escr::Escr;

/// Total physical counters (and CCCRs) on a NetBurst core
pub const NUM_PHYSICAL_COUNTERS: usize = 18;

/// Total ESCRs on a NetBurst core
pub const NUM_ESCRS: usize = 45;

/// First model number that no longer implements `IQ_ESCR0/1`
pub const FIRST_MODEL_WITHOUT_IQ_ESCR: u8 = 0x3;

/// `IA32_MISC_ENABLE` bit 7: performance monitoring available
pub const MISC_ENABLE_PERF_MON_AVAILABLE: u64 = 1 << 7;

/// Whether `IA32_MISC_ENABLE` reports usable performance counters
pub const fn perf_monitoring_available(misc_enable: u64) -> bool {
    misc_enable & MISC_ENABLE_PERF_MON_AVAILABLE != 0
}

/// Which half of the shared counting resources a logical CPU owns
///
/// The discriminant doubles as the address offset into every strided range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Stagger {
    /// First sibling of a hyper-threaded pair, or the only logical CPU
    Even = 0,
    /// Second sibling of a hyper-threaded pair
    Odd = 1,
}

impl Stagger {
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn offset(self) -> u64 {
        self as u64
    }
}

/// MSR addresses for the NetBurst PMU
pub mod msr {
    pub const IA32_MISC_ENABLE: u64 = 0x1A0;

    /// Counter registers
    pub const BPU_PERFCTR0: u64 = 0x300;
    pub const BPU_PERFCTR1: u64 = 0x301;
    pub const BPU_PERFCTR2: u64 = 0x302;
    pub const BPU_PERFCTR3: u64 = 0x303;
    pub const MS_PERFCTR0: u64 = 0x304;
    pub const MS_PERFCTR1: u64 = 0x305;
    pub const MS_PERFCTR2: u64 = 0x306;
    pub const MS_PERFCTR3: u64 = 0x307;
    pub const FLAME_PERFCTR0: u64 = 0x308;
    pub const FLAME_PERFCTR1: u64 = 0x309;
    pub const FLAME_PERFCTR2: u64 = 0x30A;
    pub const FLAME_PERFCTR3: u64 = 0x30B;
    pub const IQ_PERFCTR0: u64 = 0x30C;
    pub const IQ_PERFCTR1: u64 = 0x30D;
    pub const IQ_PERFCTR2: u64 = 0x30E;
    pub const IQ_PERFCTR3: u64 = 0x30F;
    pub const IQ_PERFCTR4: u64 = 0x310;
    pub const IQ_PERFCTR5: u64 = 0x311;

    /// Counter Configuration Control Registers
    pub const BPU_CCCR0: u64 = 0x360;
    pub const BPU_CCCR1: u64 = 0x361;
    pub const BPU_CCCR2: u64 = 0x362;
    pub const BPU_CCCR3: u64 = 0x363;
    pub const MS_CCCR0: u64 = 0x364;
    pub const MS_CCCR1: u64 = 0x365;
    pub const MS_CCCR2: u64 = 0x366;
    pub const MS_CCCR3: u64 = 0x367;
    pub const FLAME_CCCR0: u64 = 0x368;
    pub const FLAME_CCCR1: u64 = 0x369;
    pub const FLAME_CCCR2: u64 = 0x36A;
    pub const FLAME_CCCR3: u64 = 0x36B;
    pub const IQ_CCCR0: u64 = 0x36C;
    pub const IQ_CCCR1: u64 = 0x36D;
    pub const IQ_CCCR2: u64 = 0x36E;
    pub const IQ_CCCR3: u64 = 0x36F;
    pub const IQ_CCCR4: u64 = 0x370;
    pub const IQ_CCCR5: u64 = 0x371;

    /// Event Selection Control Registers, in address order
    pub const BSU_ESCR0: u64 = 0x3A0;
    pub const BSU_ESCR1: u64 = 0x3A1;
    pub const FSB_ESCR0: u64 = 0x3A2;
    pub const FSB_ESCR1: u64 = 0x3A3;
    pub const FIRM_ESCR0: u64 = 0x3A4;
    pub const FIRM_ESCR1: u64 = 0x3A5;
    pub const FLAME_ESCR0: u64 = 0x3A6;
    pub const FLAME_ESCR1: u64 = 0x3A7;
    pub const DAC_ESCR0: u64 = 0x3A8;
    pub const DAC_ESCR1: u64 = 0x3A9;
    pub const MOB_ESCR0: u64 = 0x3AA;
    pub const MOB_ESCR1: u64 = 0x3AB;
    pub const PMH_ESCR0: u64 = 0x3AC;
    pub const PMH_ESCR1: u64 = 0x3AD;
    pub const SAAT_ESCR0: u64 = 0x3AE;
    pub const SAAT_ESCR1: u64 = 0x3AF;
    pub const U2L_ESCR0: u64 = 0x3B0;
    pub const U2L_ESCR1: u64 = 0x3B1;
    pub const BPU_ESCR0: u64 = 0x3B2;
    pub const BPU_ESCR1: u64 = 0x3B3;
    pub const IS_ESCR0: u64 = 0x3B4;
    pub const IS_ESCR1: u64 = 0x3B5;
    pub const ITLB_ESCR0: u64 = 0x3B6;
    pub const ITLB_ESCR1: u64 = 0x3B7;
    pub const CRU_ESCR0: u64 = 0x3B8;
    pub const CRU_ESCR1: u64 = 0x3B9;
    pub const IQ_ESCR0: u64 = 0x3BA; // models < 3 only
    pub const IQ_ESCR1: u64 = 0x3BB; // models < 3 only
    pub const RAT_ESCR0: u64 = 0x3BC;
    pub const RAT_ESCR1: u64 = 0x3BD;
    pub const SSU_ESCR0: u64 = 0x3BE;
    pub const MS_ESCR0: u64 = 0x3C0;
    pub const MS_ESCR1: u64 = 0x3C1;
    pub const TBPU_ESCR0: u64 = 0x3C2;
    pub const TBPU_ESCR1: u64 = 0x3C3;
    pub const TC_ESCR0: u64 = 0x3C4;
    pub const TC_ESCR1: u64 = 0x3C5;
    pub const IX_ESCR0: u64 = 0x3C8;
    pub const IX_ESCR1: u64 = 0x3C9;
    pub const ALF_ESCR0: u64 = 0x3CA;
    pub const ALF_ESCR1: u64 = 0x3CB;
    pub const CRU_ESCR2: u64 = 0x3CC;
    pub const CRU_ESCR3: u64 = 0x3CD;
    pub const CRU_ESCR4: u64 = 0x3E0;
    pub const CRU_ESCR5: u64 = 0x3E1;
}
