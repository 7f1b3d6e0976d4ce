//! Command-line and environment overrides.
//!
//! Precedence: flag/env > config file > application default.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::{AppConfig, LogFormat};
use crate::config::validation::validate_config;

/// Flags every application accepts.
#[derive(Debug, Clone, Default, Args)]
pub struct ServerArgs {
    /// TOML configuration file
    #[arg(long, env = "APPLICATION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Network to serve on (tcp, tcp4, tcp6, unix)
    #[arg(long, env = "APPLICATION_NETWORK")]
    pub network: Option<String>,

    /// Address to serve on
    #[arg(long, env = "APPLICATION_ADDRESS")]
    pub address: Option<String>,

    /// Time to wait for tasks after a failure, 0 for no limit
    #[arg(long, env = "APPLICATION_DRAIN_TIMEOUT_MS")]
    pub drain_timeout_ms: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, env = "APPLICATION_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

/// Application-specific arguments are flattened next to [`ServerArgs`].
#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct CommandLine<A: Args> {
    #[command(flatten)]
    pub server: ServerArgs,

    #[command(flatten)]
    pub app: A,
}

/// For applications without arguments of their own.
#[derive(Debug, Clone, Default, Args)]
pub struct NoArgs {}

impl ServerArgs {
    /// Load the config file (if any) and apply overrides.
    pub fn resolve(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => AppConfig::default(),
        };

        if let Some(network) = &self.network {
            config.listener.network = network.clone();
        }
        if let Some(address) = &self.address {
            config.listener.address = address.clone();
        }
        if let Some(ms) = self.drain_timeout_ms {
            config.shutdown.drain_timeout_ms = Some(ms);
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

impl AppConfig {
    /// Configured drain timeout, or `fallback` when unset.
    pub fn drain_timeout(&self, fallback: Duration) -> Duration {
        self.shutdown
            .drain_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(fallback)
    }
}
