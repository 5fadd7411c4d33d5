//! Counter Configuration Control Register (CCCR) layout
//!
//! ## Register Format
//!
//! | Bits   | Field        | Description                              |
//! |--------|--------------|------------------------------------------|
//! | 0-11   | reserved     | Must be preserved                        |
//! | 12     | enable       | Counter enable                           |
//! | 13-15  | escr_select  | Which ESCR feeds this counter            |
//! | 16-17  | active_thread| Must be 0b11 (count on either thread)    |
//! | 18     | compare      | Threshold compare (unused here)          |
//! | 19     | complement   | Threshold complement (unused here)       |
//! | 20-23  | threshold    | Threshold value (unused here)            |
//! | 24     | edge         | Edge detect (unused here)                |
//! | 25     | force_ovf    | Force overflow (unused here)             |
//! | 26     | ovf_pmi_t0   | PMI on overflow to thread 0              |
//! | 27     | ovf_pmi_t1   | PMI on overflow to thread 1              |
//! | 28-29  | reserved     | Must be preserved                        |
//! | 30     | cascade      | Counter cascading (unused here)          |
//! | 31     | ovf          | Sticky overflow flag                     |

use super::Stagger;
use crate::register::{LayoutError, RegisterLayout};

/// Bits kept when a CCCR is cleared
pub const CCCR_RESERVED_BITS: u64 = 0x3803_0FFF;

/// Bits that must always be written as set
pub const CCCR_REQUIRED_BITS: u64 = 0x0003_0000;

const ENABLE_BIT: u64 = 1 << 12;
const ESCR_SELECT_SHIFT: u32 = 13;
const ESCR_SELECT_MASK: u64 = 0x7;
const OVF_PMI_T0_BIT: u64 = 1 << 26;
const OVF_PMI_T1_BIT: u64 = 1 << 27;
const OVF_BIT: u64 = 1 << 31;

/// Raw CCCR value with pure field updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cccr(u64);

impl Cccr {
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Drop everything except [`CCCR_RESERVED_BITS`]
    pub const fn cleared(self) -> Self {
        Self(self.0 & CCCR_RESERVED_BITS)
    }

    /// Set the active-thread bits 16-17
    pub const fn with_required_bits(self) -> Self {
        Self(self.0 | CCCR_REQUIRED_BITS)
    }

    /// ESCR select, bits 13-15
    pub const fn with_escr_select(self, select: u8) -> Self {
        Self(self.0 | ((select as u64 & ESCR_SELECT_MASK) << ESCR_SELECT_SHIFT))
    }

    /// PMI on overflow: bit 26 for the even sibling, bit 27 for the odd one
    pub const fn with_pmi_on_overflow(self, stagger: Stagger) -> Self {
        match stagger {
            Stagger::Even => Self(self.0 | OVF_PMI_T0_BIT),
            Stagger::Odd => Self(self.0 | OVF_PMI_T1_BIT),
        }
    }

    /// Set bit 12
    pub const fn enabled(self) -> Self {
        Self(self.0 | ENABLE_BIT)
    }

    /// Clear bit 12
    pub const fn disabled(self) -> Self {
        Self(self.0 & !ENABLE_BIT)
    }

    /// Clear the sticky overflow flag, bit 31
    pub const fn without_overflow(self) -> Self {
        Self(self.0 & !OVF_BIT)
    }

    pub const fn is_enabled(self) -> bool {
        self.0 & ENABLE_BIT != 0
    }

    pub const fn overflowed(self) -> bool {
        self.0 & OVF_BIT != 0
    }

    pub const fn escr_select(self) -> u8 {
        ((self.0 >> ESCR_SELECT_SHIFT) & ESCR_SELECT_MASK) as u8
    }

    pub const fn pmi_on_overflow(self, stagger: Stagger) -> bool {
        match stagger {
            Stagger::Even => self.0 & OVF_PMI_T0_BIT != 0,
            Stagger::Odd => self.0 & OVF_PMI_T1_BIT != 0,
        }
    }
}

impl RegisterLayout for Cccr {
    fn to_msr_value(&self) -> u64 {
        self.0
    }

    fn from_msr_value(value: u64) -> Self {
        Self(value)
    }

    fn validate(&self) -> Result<(), LayoutError> {
        if self.0 & CCCR_REQUIRED_BITS != CCCR_REQUIRED_BITS {
            return Err(LayoutError::MissingRequiredBits {
                value: self.0,
                required: CCCR_REQUIRED_BITS,
            });
        }
        Ok(())
    }
}
