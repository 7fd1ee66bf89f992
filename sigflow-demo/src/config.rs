//! Demo configuration
//!
//! Loaded from a TOML file. Every key is optional; missing keys fall back
//! to [`DemoConfig::default`].

use std::fmt;
use std::path::Path;

use embassy_time::Duration;
use serde::Deserialize;
use sigflow_core::{DispatcherConfig, PostTimeout};

/// File read when no path is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "demo.toml";

/// Smallest usable queue: the first state's ENTRY posts INIT, and
/// `start` then posts USER behind it
pub const MIN_QUEUE_DEPTH: usize = 2;

/// Largest queue the statically allocated storage can back
pub const MAX_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    /// Records the queue can hold
    pub queue_depth: usize,
    pub post_timeout_ms: u64,
    /// Task posts wait for a free slot with no deadline
    pub post_wait_forever: bool,
    /// Stop after this many state transitions
    pub transitions: u32,
    pub tick_period_ms: u64,
    pub isr_period_ms: u64,
    /// Events posted per simulated interrupt
    pub isr_burst: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            queue_depth: 8,
            post_timeout_ms: 100,
            post_wait_forever: false,
            transitions: 6,
            tick_period_ms: 20,
            isr_period_ms: 35,
            isr_burst: 2,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    QueueDepth(usize),
    ZeroPeriod,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {e}"),
            ConfigError::Parse(e) => write!(f, "invalid config: {e}"),
            ConfigError::QueueDepth(depth) => {
                write!(
                    f,
                    "queue_depth {depth} outside {MIN_QUEUE_DEPTH}..={MAX_QUEUE_DEPTH} \
                     (startup queues INIT and USER together)"
                )
            }
            ConfigError::ZeroPeriod => write!(f, "tick and isr periods must be non-zero"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl DemoConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_PATH`] if it exists
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let text = match path {
            Some(path) => std::fs::read_to_string(path).map_err(ConfigError::Io)?,
            None => match std::fs::read_to_string(DEFAULT_CONFIG_PATH) {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    log::info!("{DEFAULT_CONFIG_PATH} not found, using defaults");
                    return Ok(Self::default());
                }
                Err(e) => return Err(ConfigError::Io(e)),
            },
        };
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_QUEUE_DEPTH..=MAX_QUEUE_DEPTH).contains(&self.queue_depth) {
            return Err(ConfigError::QueueDepth(self.queue_depth));
        }
        if self.tick_period_ms == 0 || self.isr_period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(())
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        let timeout_ms = (!self.post_wait_forever).then_some(self.post_timeout_ms);
        DispatcherConfig::default().with_post_timeout(PostTimeout::from_millis(timeout_ms))
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn isr_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.isr_period_ms)
    }
}
