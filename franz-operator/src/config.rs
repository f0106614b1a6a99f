//! Runtime configuration.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime configuration data.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The server's logging config, which uses Rust's `env_logger` directives.
    pub rust_log: String,

    /// The Kubernetes namespace watched by this operator instance.
    pub namespace: String,
    /// The name of the pod on which this instance is running.
    pub pod_name: String,

    /// The interval in seconds between timed resync passes over a converged cluster.
    #[serde(default = "Config::default_resync_seconds")]
    pub resync_seconds: u64,
    /// The interval in seconds before retrying a pass which hit a transient error.
    #[serde(default = "Config::default_retry_seconds")]
    pub retry_seconds: u64,
}

impl Config {
    /// Create a new config instance.
    ///
    /// Currently this routine just parses the runtime environment and builds the application
    /// config from that. In the future, this may take into account an optional config file as
    /// well.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Result<Self> {
        envy::from_env().context("error building config from env")
    }

    fn default_resync_seconds() -> u64 {
        300
    }

    fn default_retry_seconds() -> u64 {
        15
    }
}
