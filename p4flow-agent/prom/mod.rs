pub mod samples;

pub use samples::SampleExporter;
