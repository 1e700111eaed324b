//! Compiler and executor options
//!
//! Options can be built in code or loaded from YAML:
//!
//! ```yaml
//! channel_capacity: 32
//! default_edge_sorter: node_key
//! logging: tracing
//! sweep_interval: 500ms
//! ```
//!
//! Every field is optional; omitted fields take their defaults.

use crate::attributes::duration;
use crate::error::{FlowError, Result};
use crate::logger::{Logger, NoLogging, TracingLogger};
use crate::sort;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Which [`Logger`] the engine uses when none is supplied programmatically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogMode {
    /// Discard diagnostics
    #[default]
    None,
    /// Forward diagnostics to `tracing`
    Tracing,
}

/// Options for [`Executor::new`](crate::Executor::new) and [`analyze`](crate::analyze).
#[derive(Clone, Serialize, Deserialize)]
pub struct Options {
    /// Buffer size of every edge and collector channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Edge ordering for nodes without an `edge_sorter` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_edge_sorter: Option<String>,

    /// Logger selection when [`logger`](Self::logger) is not set.
    #[serde(default)]
    pub logging: LogMode,

    /// How often workers drop partially gathered flows whose context is done.
    #[serde(default = "default_sweep_interval", with = "duration")]
    pub sweep_interval: Duration,

    /// Programmatic logger, takes precedence over [`logging`](Self::logging).
    #[serde(skip)]
    pub logger: Option<Arc<dyn Logger>>,
}

fn default_channel_capacity() -> usize {
    16
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for Options {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            default_edge_sorter: None,
            logging: LogMode::default(),
            sweep_interval: default_sweep_interval(),
            logger: None,
        }
    }
}

impl Options {
    /// Parse options from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let options: Self = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_default_edge_sorter(mut self, name: impl Into<String>) -> Self {
        self.default_edge_sorter = Some(name.into());
        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(FlowError::Configuration(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(FlowError::Configuration(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }
        if let Some(name) = &self.default_edge_sorter {
            if sort::lookup(name).is_none() {
                return Err(FlowError::Configuration(format!(
                    "unknown edge sorter '{}', expected one of: {}",
                    name,
                    sort::sorter_names().collect::<Vec<_>>().join(", ")
                )));
            }
        }
        Ok(())
    }

    /// The logger to use: the programmatic one, else the one `logging` selects.
    pub fn resolve_logger(&self) -> Arc<dyn Logger> {
        if let Some(logger) = &self.logger {
            return Arc::clone(logger);
        }
        match self.logging {
            LogMode::None => Arc::new(NoLogging),
            LogMode::Tracing => Arc::new(TracingLogger),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("channel_capacity", &self.channel_capacity)
            .field("default_edge_sorter", &self.default_edge_sorter)
            .field("logging", &self.logging)
            .field("sweep_interval", &self.sweep_interval)
            .field("logger", &self.logger.as_ref().map(|_| "<custom>"))
            .finish()
    }
}
