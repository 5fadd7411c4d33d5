pub mod samples;

pub use samples::SampleMetric;
