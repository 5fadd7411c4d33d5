use serde::Deserialize;
use std::path::Path;

use crate::counters::netburst::catalog;
use crate::error::{P4FlowError, Result};

/// Per-virtual-counter settings, applied by the setup sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterConfig {
    pub enabled: bool,
    /// 1-based index into the event catalog
    pub event: u32,
    pub unit_mask: u16,
    pub user: bool,
    pub kernel: bool,
    /// Events between samples; also the reset value
    pub count: u64,
}

impl CounterConfig {
    pub fn new(event: u32, count: u64) -> Self {
        Self {
            enabled: true,
            event,
            unit_mask: 0,
            user: true,
            kernel: true,
            count,
        }
    }

    pub fn unit_mask(mut self, unit_mask: u16) -> Self {
        self.unit_mask = unit_mask;
        self
    }

    pub fn privilege(mut self, user: bool, kernel: bool) -> Self {
        self.user = user;
        self.kernel = kernel;
        self
    }
}

/// Event given either by catalog name or by numeric code
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EventRef {
    Code(u32),
    Name(String),
}

impl EventRef {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        parse_number::<u32>(s).map_or_else(|| EventRef::Name(s.to_string()), EventRef::Code)
    }

    /// Names must exist in the catalog; codes are passed through unchecked so
    /// an out-of-range code surfaces at setup time
    pub fn resolve(&self) -> Result<u32> {
        match self {
            EventRef::Code(code) => Ok(*code),
            EventRef::Name(name) => catalog::event_code(name)
                .ok_or_else(|| P4FlowError::ConfigError(format!("Unknown P4 event '{name}'"))),
        }
    }
}

fn default_true() -> bool {
    true
}

/// One counter entry of a profile file
#[derive(Debug, Clone, Deserialize)]
pub struct CounterEntry {
    pub event: EventRef,
    pub count: u64,
    #[serde(default)]
    pub unit_mask: u16,
    #[serde(default = "default_true")]
    pub user: bool,
    #[serde(default = "default_true")]
    pub kernel: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl CounterEntry {
    pub fn to_config(&self) -> Result<CounterConfig> {
        Ok(CounterConfig {
            enabled: self.enabled,
            event: self.event.resolve()?,
            unit_mask: self.unit_mask,
            user: self.user,
            kernel: self.kernel,
            count: self.count,
        })
    }
}

/// Profile file layout
///
/// ```yaml
/// cpus: "0-1"
/// counters:
///   - event: INSTR_RETIRED
///     count: 100000
///     unit_mask: 0x1
///   - event: 29
///     count: 500000
///     kernel: false
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileFile {
    #[serde(default)]
    pub cpus: Option<String>,
    pub counters: Vec<CounterEntry>,
}

/// Everything a sampling run needs
#[derive(Debug, Clone)]
pub struct ProfileConfig {
    pub cpus: Vec<u32>,
    pub counters: Vec<CounterConfig>,
}

impl ProfileConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let file: ProfileFile = serde_yaml::from_str(text)?;

        let cpus = match file.cpus.as_deref() {
            Some(list) => crate::common::topology::parse_cpu_list(list).ok_or_else(|| {
                P4FlowError::ConfigError(format!("Invalid cpu list '{list}'"))
            })?,
            None => Vec::new(),
        };

        let counters = file
            .counters
            .iter()
            .map(CounterEntry::to_config)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { cpus, counters })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&text)?;
        tracing::info!(
            "Loaded {} counter(s) from {}",
            config.counters.len(),
            path.display()
        );
        Ok(config)
    }
}

/// Decimal, or hex with a `0x`/`0X` prefix
fn parse_number<T: TryFrom<u64>>(s: &str) -> Option<T> {
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => s.parse::<u64>().ok()?,
    };
    T::try_from(value).ok()
}

/// Parse `EVENT:COUNT[:UNIT_MASK]`, e.g. `INSTR_RETIRED:100000:0x1`
pub fn parse_event_spec(spec: &str, user: bool, kernel: bool) -> Result<CounterConfig> {
    let mut parts = spec.split(':');
    let invalid = || P4FlowError::ParseError(format!("Invalid event spec '{spec}'"));

    let event = EventRef::parse(parts.next().ok_or_else(invalid)?).resolve()?;
    let count = parts
        .next()
        .and_then(|c| c.trim().parse::<u64>().ok())
        .ok_or_else(invalid)?;
    let unit_mask = match parts.next() {
        Some(mask) => {
            parse_number::<u16>(mask.trim()).ok_or_else(invalid)?
        }
        None => 0,
    };
    if parts.next().is_some() {
        return Err(invalid());
    }

    Ok(CounterConfig::new(event, count)
        .unit_mask(unit_mask)
        .privilege(user, kernel))
}
