// Static NetBurst resource tables: counter slots, event bindings, spare CCCRs

use p4flow_raw::current_arch::msr::*;

use crate::enum_with_data;
use crate::error::{P4FlowError, Result};

/// Number of events in [`P4_EVENTS`]; valid event codes are `1..=NUM_EVENTS`
pub const NUM_EVENTS: usize = 39;

/// Counter slots this model can bind to
pub const NUM_COUNTERS_NON_HT: usize = 8;

enum_with_data! {
    /// Physical counter slots, in catalog order. The even sibling of a
    /// hyper-threaded core owns slots 0-3, the odd sibling slots 4-7.
    pub enum CounterTag: usize {
        Bpu0 => ("BPU_0", 0),
        Ms0 => ("MS_0", 1),
        Flame0 => ("FLAME_0", 2),
        Iq4 => ("IQ_4", 3),
        Bpu2 => ("BPU_2", 4),
        Ms2 => ("MS_2", 5),
        Flame2 => ("FLAME_2", 6),
        Iq5 => ("IQ_5", 7),
    }
    impl slot -> usize
}

impl CounterTag {
    /// Membership bit of this slot among its siblings
    pub fn bit(&self) -> u8 {
        1 << self.slot()
    }
}

/// A physical counter and the CCCR that gates it
#[derive(Debug, Clone, Copy)]
pub struct PhysicalCounter {
    pub tag: CounterTag,
    pub counter: u64,
    pub cccr: u64,
}

pub const P4_COUNTERS: [PhysicalCounter; NUM_COUNTERS_NON_HT] = [
    PhysicalCounter { tag: CounterTag::Bpu0, counter: BPU_PERFCTR0, cccr: BPU_CCCR0 },
    PhysicalCounter { tag: CounterTag::Ms0, counter: MS_PERFCTR0, cccr: MS_CCCR0 },
    PhysicalCounter { tag: CounterTag::Flame0, counter: FLAME_PERFCTR0, cccr: FLAME_CCCR0 },
    PhysicalCounter { tag: CounterTag::Iq4, counter: IQ_PERFCTR4, cccr: IQ_CCCR4 },
    PhysicalCounter { tag: CounterTag::Bpu2, counter: BPU_PERFCTR2, cccr: BPU_CCCR2 },
    PhysicalCounter { tag: CounterTag::Ms2, counter: MS_PERFCTR2, cccr: MS_CCCR2 },
    PhysicalCounter { tag: CounterTag::Flame2, counter: FLAME_PERFCTR2, cccr: FLAME_CCCR2 },
    PhysicalCounter { tag: CounterTag::Iq5, counter: IQ_PERFCTR5, cccr: IQ_CCCR5 },
];

/// CCCRs with no slot in [`P4_COUNTERS`]; setup still clears them
pub const UNUSED_CCCRS: [u64; 10] = [
    BPU_CCCR1, BPU_CCCR3,
    MS_CCCR1, MS_CCCR3,
    FLAME_CCCR1, FLAME_CCCR3,
    IQ_CCCR0, IQ_CCCR1,
    IQ_CCCR2, IQ_CCCR3,
];

/// "Count on this slot through this ESCR"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrBinding {
    pub counter: CounterTag,
    pub escr: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct EventBinding {
    pub name: &'static str,
    /// CCCR bits 13-15
    pub escr_select: u8,
    /// ESCR bits 25-30
    pub event_select: u8,
    pub bindings: [Option<EscrBinding>; 2],
    /// Set when the hardware mapping has not been confirmed
    pub unverified: Option<&'static str>,
}

impl EventBinding {
    const fn pair(
        name: &'static str,
        escr_select: u8,
        event_select: u8,
        first: (CounterTag, u64),
        second: (CounterTag, u64),
    ) -> Self {
        Self {
            name,
            escr_select,
            event_select,
            bindings: [
                Some(EscrBinding { counter: first.0, escr: first.1 }),
                Some(EscrBinding { counter: second.0, escr: second.1 }),
            ],
            unverified: None,
        }
    }

    const fn single(
        name: &'static str,
        escr_select: u8,
        event_select: u8,
        only: (CounterTag, u64),
    ) -> Self {
        Self {
            name,
            escr_select,
            event_select,
            bindings: [Some(EscrBinding { counter: only.0, escr: only.1 }), None],
            unverified: None,
        }
    }

    const fn flagged(mut self, note: &'static str) -> Self {
        self.unverified = Some(note);
        self
    }

    pub fn candidates(&self) -> impl Iterator<Item = &EscrBinding> + '_ {
        self.bindings.iter().flatten()
    }

    /// First candidate whose slot bit equals `counter_bit`
    pub fn binding_for(&self, counter_bit: u8) -> Option<&EscrBinding> {
        self.candidates().find(|b| b.counter.bit() == counter_bit)
    }
}

use CounterTag::*;

/// Event code `n` is `P4_EVENTS[n - 1]`
#[rustfmt::skip]
pub const P4_EVENTS: [EventBinding; NUM_EVENTS] = [
    EventBinding::pair("BRANCH_RETIRED", 0x05, 0x06, (Iq4, CRU_ESCR2), (Iq5, CRU_ESCR3)),
    EventBinding::pair("MISPRED_BRANCH_RETIRED", 0x04, 0x03, (Iq4, CRU_ESCR0), (Iq5, CRU_ESCR1)),
    EventBinding::pair("TC_DELIVER_MODE", 0x01, 0x01, (Ms0, TC_ESCR0), (Ms2, TC_ESCR1)),
    EventBinding::pair("BPU_FETCH_REQUEST", 0x00, 0x03, (Bpu0, BPU_ESCR0), (Bpu2, BPU_ESCR1)),
    EventBinding::pair("ITLB_REFERENCE", 0x03, 0x18, (Bpu0, ITLB_ESCR0), (Bpu2, ITLB_ESCR1)),
    EventBinding::pair("MEMORY_CANCEL", 0x05, 0x02, (Flame0, DAC_ESCR0), (Flame2, DAC_ESCR1)),
    EventBinding::pair("MEMORY_COMPLETE", 0x02, 0x08, (Flame0, SAAT_ESCR0), (Flame2, SAAT_ESCR1)),
    EventBinding::pair("LOAD_PORT_REPLAY", 0x02, 0x04, (Flame0, SAAT_ESCR0), (Flame2, SAAT_ESCR1)),
    EventBinding::pair("STORE_PORT_REPLAY", 0x02, 0x05, (Flame0, SAAT_ESCR0), (Flame2, SAAT_ESCR1)),
    EventBinding::pair("MOB_LOAD_REPLAY", 0x02, 0x03, (Bpu0, MOB_ESCR0), (Bpu2, MOB_ESCR1)),
    EventBinding::pair("PAGE_WALK_TYPE", 0x04, 0x01, (Bpu0, PMH_ESCR0), (Bpu2, PMH_ESCR1)),
    EventBinding::pair("BSQ_CACHE_REFERENCE", 0x07, 0x0c, (Bpu0, BSU_ESCR0), (Bpu2, BSU_ESCR1)),
    EventBinding::single("IOQ_ALLOCATION", 0x06, 0x03, (Bpu0, FSB_ESCR0)),
    EventBinding::single("IOQ_ACTIVE_ENTRIES", 0x06, 0x1a, (Bpu2, FSB_ESCR1)),
    EventBinding::pair("FSB_DATA_ACTIVITY", 0x06, 0x17, (Bpu0, FSB_ESCR0), (Bpu2, FSB_ESCR1)),
    EventBinding::single("BSQ_ALLOCATION", 0x07, 0x05, (Bpu0, BSU_ESCR0)),
    EventBinding::single("BSQ_ACTIVE_ENTRIES", 0x07, 0x06, (Bpu2, BSU_ESCR1))
        .flagged("BPU_2 via BSU_ESCR1 is a guess"),
    EventBinding::pair("X87_ASSIST", 0x05, 0x03, (Iq4, CRU_ESCR2), (Iq5, CRU_ESCR3)),
    EventBinding::pair("SSE_INPUT_ASSIST", 0x01, 0x34, (Flame0, FIRM_ESCR0), (Flame2, FIRM_ESCR1)),
    EventBinding::pair("PACKED_SP_UOP", 0x01, 0x08, (Flame0, FIRM_ESCR0), (Flame2, FIRM_ESCR1)),
    EventBinding::pair("PACKED_DP_UOP", 0x01, 0x0c, (Flame0, FIRM_ESCR0), (Flame2, FIRM_ESCR1)),
    EventBinding::pair("SCALAR_SP_UOP", 0x01, 0x0a, (Flame0, FIRM_ESCR0), (Flame2, FIRM_ESCR1)),
    EventBinding::pair("SCALAR_DP_UOP", 0x01, 0x0e, (Flame0, FIRM_ESCR0), (Flame2, FIRM_ESCR1)),
    EventBinding::pair("64BIT_MMX_UOP", 0x01, 0x02, (Flame0, FIRM_ESCR0), (Flame2, FIRM_ESCR1)),
    EventBinding::pair("128BIT_MMX_UOP", 0x01, 0x1a, (Flame0, FIRM_ESCR0), (Flame2, FIRM_ESCR1)),
    EventBinding::pair("X87_FP_UOP", 0x01, 0x04, (Flame0, FIRM_ESCR0), (Flame2, FIRM_ESCR1)),
    EventBinding::pair("X87_SIMD_MOVES_UOP", 0x01, 0x2e, (Flame0, FIRM_ESCR0), (Flame2, FIRM_ESCR1)),
    EventBinding::pair("MACHINE_CLEAR", 0x05, 0x02, (Iq4, CRU_ESCR2), (Iq5, CRU_ESCR3)),
    EventBinding::pair("GLOBAL_POWER_EVENTS", 0x06, 0x13, (Bpu0, FSB_ESCR0), (Bpu2, FSB_ESCR1))
        .flagged("event select is 0x05 in older manuals, 0x13 in newer ones"),
    EventBinding::pair("TC_MS_XFER", 0x00, 0x05, (Ms0, MS_ESCR0), (Ms2, MS_ESCR1)),
    EventBinding::pair("UOP_QUEUE_WRITES", 0x00, 0x09, (Ms0, MS_ESCR0), (Ms2, MS_ESCR1)),
    EventBinding::pair("FRONT_END_EVENT", 0x05, 0x08, (Iq4, CRU_ESCR2), (Iq5, CRU_ESCR3)),
    EventBinding::pair("EXECUTION_EVENT", 0x05, 0x0c, (Iq4, CRU_ESCR2), (Iq5, CRU_ESCR3)),
    EventBinding::pair("REPLAY_EVENT", 0x05, 0x09, (Iq4, CRU_ESCR2), (Iq5, CRU_ESCR3)),
    EventBinding::pair("INSTR_RETIRED", 0x04, 0x02, (Iq4, CRU_ESCR0), (Iq5, CRU_ESCR1)),
    EventBinding::pair("UOPS_RETIRED", 0x04, 0x01, (Iq4, CRU_ESCR0), (Iq5, CRU_ESCR1)),
    EventBinding::pair("UOP_TYPE", 0x02, 0x02, (Iq4, RAT_ESCR0), (Iq5, RAT_ESCR1)),
    EventBinding::pair("RETIRED_MISPRED_BRANCH_TYPE", 0x02, 0x05, (Ms0, TBPU_ESCR0), (Ms2, TBPU_ESCR1)),
    EventBinding::pair("RETIRED_BRANCH_TYPE", 0x02, 0x04, (Ms0, TBPU_ESCR0), (Ms2, TBPU_ESCR1)),
];

/// Look up an event by its 1-based code
pub fn event(code: u32) -> Result<&'static EventBinding> {
    if code == 0 || code as usize > NUM_EVENTS {
        return Err(P4FlowError::InvalidEventCode(code));
    }
    Ok(&P4_EVENTS[code as usize - 1])
}

/// Event code for a name such as `INSTR_RETIRED` (case-insensitive)
pub fn event_code(name: &str) -> Option<u32> {
    P4_EVENTS
        .iter()
        .position(|ev| ev.name.eq_ignore_ascii_case(name))
        .map(|idx| idx as u32 + 1)
}
