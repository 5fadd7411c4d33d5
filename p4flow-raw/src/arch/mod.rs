//! Architecture-specific register definitions
//!
//! ## Supported Architectures
//!
//! - **NetBurst** (`netburst` feature) - Pentium 4, Pentium D and NetBurst Xeon,
//!   CPUID family 0xF

#[cfg(feature = "netburst")]
pub mod netburst;
