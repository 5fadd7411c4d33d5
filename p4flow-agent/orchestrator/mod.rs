pub mod sampler;

pub use sampler::{Backend, Sampler, SamplerConfig};
