use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum P4FlowError {
    #[error("MSR operation failed: {0}")]
    MsrError(String),

    #[error("Affinity operation failed: {0}")]
    AffinityError(String),

    #[error("P4 event code {0:#x} out of range")]
    InvalidEventCode(u32),

    #[error("P4 event code {event:#x} no binding, stag {stagger} ctr {counter}")]
    NoBindingAvailable {
        event: u32,
        stagger: u8,
        counter: usize,
    },

    #[error("P4 PMC not available")]
    PerformanceMonitoringUnavailable,

    #[error("Register layout rejected: {0}")]
    LayoutError(#[from] p4flow_raw::LayoutError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Nix error: {0}")]
    NixError(#[from] nix::Error),

    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),
}

pub type Result<T> = std::result::Result<T, P4FlowError>;
