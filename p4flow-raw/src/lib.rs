//! # p4flow-raw
//!
//! Register definitions for Intel NetBurst (Pentium 4 / Xeon) performance
//! monitoring.
//!
//! NetBurst does not use the architectural `IA32_PERFEVTSELx` model. Each of its
//! 18 counters is gated by a Counter Configuration Control Register (CCCR),
//! and the event itself is chosen in one of 45 Event Selection Control
//! Registers (ESCRs). On hyper-threaded parts both logical CPUs share these
//! registers and split them into two "thread lanes".
//!
//! This crate only describes addresses and bit layouts. It performs no MSR
//! access itself.
//!
//! ## Usage
//!
//! ```
//! use p4flow_raw::current_arch::{msr, Cccr, Escr, Stagger};
//!
//! let escr = Escr::from_raw(0)
//!     .cleared()
//!     .with_usr(Stagger::Even, true)
//!     .with_event_select(0x06);
//! assert_eq!(escr.event_select(), 0x06);
//!
//! let cccr = Cccr::from_raw(0).cleared().with_required_bits().enabled();
//! assert!(cccr.is_enabled());
//! assert_eq!(msr::BPU_CCCR0, 0x360);
//! ```

pub mod arch;
pub mod register;

pub use register::{LayoutError, Register, RegisterLayout};

// Export current architecture based on feature flag
#[cfg(feature = "netburst")]
pub use arch::netburst as current_arch;
