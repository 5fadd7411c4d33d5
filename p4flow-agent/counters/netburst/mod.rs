//! NetBurst counter virtualization
//!
//! A NetBurst core exposes its counting resources to one or two logical
//! CPUs. This module hands each logical CPU a fixed set of virtual counters,
//! programs them from the event catalog, and turns counter overflows into
//! samples.

pub mod addresses;
pub mod catalog;
pub mod control;
pub mod events;
pub mod model;
pub mod monitor;
pub mod setup;
pub mod topology;

pub use addresses::{fill_addresses, MsrAddresses};
pub use catalog::{CounterTag, EscrBinding, EventBinding, P4_COUNTERS, P4_EVENTS};
pub use control::{start_ctrs, stop_ctrs};
pub use events::configure;
pub use model::{CounterModel, ModelSpec, P4Session, P4_HT2_SPEC, P4_SPEC};
pub use monitor::{check_ctrs, ExecMode, InterruptFrame, SampleSink};
pub use setup::setup_ctrs;
pub use topology::{stagger, Topology};
