//! Configuration.
//!
//! Pages embed their configuration as a JSON blob; every field has a default
//! so partial blobs are valid.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerOptions,
    pub kernel: KernelOptions,
    pub session: SessionOptions,
    pub busy: BusyOptions,
}

impl Config {
    /// Parse a JSON configuration blob.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.session.name.trim().is_empty() {
            return Err(Error::Config("session name must not be empty".to_string()));
        }
        if self.kernel.name.trim().is_empty() {
            return Err(Error::Config("kernel name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Compute server connection options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Base URL of the compute server.
    pub base_url: String,
    /// Delay between readiness probes.
    pub ready_poll_interval_ms: u64,
    /// Readiness probes before the connection is declared failed.
    pub max_ready_attempts: u32,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8888".to_string(),
            ready_poll_interval_ms: 500,
            max_ready_attempts: 20,
        }
    }
}

/// Kernel options passed with every session-start request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelOptions {
    /// Kernel specification name.
    pub name: String,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            name: "python".to_string(),
        }
    }
}

/// Session lifecycle options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Logical session slot; used as display name and working path.
    pub name: String,
    /// Start the session automatically when the server becomes ready.
    pub auto_start: bool,
    /// Shut the session down when its owning scope ends.
    pub shutdown_on_teardown: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            auto_start: false,
            shutdown_on_teardown: true,
        }
    }
}

/// Busy-indicator options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusyOptions {
    /// Class of the indicator element nested under each cell.
    pub indicator_class: String,
    /// Delay before a cleared indicator is hidden.
    pub settle_delay_ms: u64,
}

impl Default for BusyOptions {
    fn default() -> Self {
        Self {
            indicator_class: "livecell-busy".to_string(),
            settle_delay_ms: 3000,
        }
    }
}
