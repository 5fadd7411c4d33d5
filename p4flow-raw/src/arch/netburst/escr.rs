//! Event Selection Control Register (ESCR) layout
//!
//! ## Register Format
//!
//! | Bits   | Field        | Description                          |
//! |--------|--------------|--------------------------------------|
//! | 0      | t1_usr       | Count at CPL > 0 on thread 1         |
//! | 1      | t1_os        | Count at CPL 0 on thread 1           |
//! | 2      | t0_usr       | Count at CPL > 0 on thread 0         |
//! | 3      | t0_os        | Count at CPL 0 on thread 0           |
//! | 4      | tag_enable   | Tag micro-ops (unused here)          |
//! | 5-8    | tag_value    | Tag value (unused here)              |
//! | 9-24   | event_mask   | Event-specific unit mask             |
//! | 25-30  | event_select | Event within the ESCR                |
//! | 31     | reserved     | Must be preserved                    |
//!
//! Bits 0-1 and 31 survive a clear. Bits 0-1 belong to the odd sibling, so an
//! even sibling clearing its ESCR never disturbs the odd sibling's lane.

use super::Stagger;
use crate::register::{LayoutError, RegisterLayout};

/// Bits kept when an ESCR is cleared
pub const ESCR_RESERVED_BITS: u64 = 0x8000_0003;

const EVENT_MASK_SHIFT: u32 = 9;
const EVENT_SELECT_SHIFT: u32 = 25;
const EVENT_SELECT_MASK: u64 = 0x3F;

/// Raw ESCR value with pure field updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Escr(u64);

impl Escr {
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Drop everything except [`ESCR_RESERVED_BITS`]
    pub const fn cleared(self) -> Self {
        Self(self.0 & ESCR_RESERVED_BITS)
    }

    /// User-mode enable: bit 2 for the even sibling, bit 0 for the odd one
    pub const fn with_usr(self, stagger: Stagger, usr: bool) -> Self {
        let bit = match stagger {
            Stagger::Even => 2,
            Stagger::Odd => 0,
        };
        Self(self.0 | ((usr as u64) << bit))
    }

    /// Kernel-mode enable: bit 3 for the even sibling, bit 1 for the odd one
    pub const fn with_os(self, stagger: Stagger, os: bool) -> Self {
        let bit = match stagger {
            Stagger::Even => 3,
            Stagger::Odd => 1,
        };
        Self(self.0 | ((os as u64) << bit))
    }

    /// Event select, bits 25-30 (upper bits of `select` are discarded)
    pub const fn with_event_select(self, select: u8) -> Self {
        Self(self.0 | ((select as u64 & EVENT_SELECT_MASK) << EVENT_SELECT_SHIFT))
    }

    /// Event mask, bits 9-24
    pub const fn with_event_mask(self, mask: u16) -> Self {
        Self(self.0 | ((mask as u64) << EVENT_MASK_SHIFT))
    }

    pub const fn event_select(self) -> u8 {
        ((self.0 >> EVENT_SELECT_SHIFT) & EVENT_SELECT_MASK) as u8
    }

    pub const fn event_mask(self) -> u16 {
        ((self.0 >> EVENT_MASK_SHIFT) & 0xFFFF) as u16
    }

    pub const fn usr(self, stagger: Stagger) -> bool {
        match stagger {
            Stagger::Even => self.0 & (1 << 2) != 0,
            Stagger::Odd => self.0 & 1 != 0,
        }
    }

    pub const fn os(self, stagger: Stagger) -> bool {
        match stagger {
            Stagger::Even => self.0 & (1 << 3) != 0,
            Stagger::Odd => self.0 & (1 << 1) != 0,
        }
    }
}

impl RegisterLayout for Escr {
    fn to_msr_value(&self) -> u64 {
        self.0
    }

    fn from_msr_value(value: u64) -> Self {
        Self(value)
    }

    fn validate(&self) -> Result<(), LayoutError> {
        // Only the low 32 bits are implemented
        if self.0 >> 32 != 0 {
            return Err(LayoutError::FieldOverflow {
                field: "escr",
                value: self.0,
                width: 32,
            });
        }
        Ok(())
    }
}
