// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod common;
pub mod config;
pub mod counters;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod platform;
pub mod prom;

pub use config::{CounterConfig, ProfileConfig};
pub use error::{P4FlowError, Result};
pub use orchestrator::{Backend, Sampler, SamplerConfig};
pub use prom::SampleExporter;
