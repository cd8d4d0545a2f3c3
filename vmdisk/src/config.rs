//! Configuration for a relocation run
//!
//! Tunables come from an optional TOML file; what to move and where to
//! connect come from the environment and command line.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use vim::{ConnectionConfig, Credentials, DatastorePath, TaskWaitConfig};

use crate::Cli;

pub const ENV_URL: &str = "GOVMOMI_URL";
pub const ENV_USERNAME: &str = "GOVMOMI_USERNAME";
pub const ENV_PASSWORD: &str = "GOVMOMI_PASSWORD";
pub const ENV_INSECURE: &str = "GOVMOMI_INSECURE";
pub const ENV_BASEPATH: &str = "VMDISK_BASEPATH";
pub const ENV_TARGET: &str = "VMDISK_TARGET";
pub const ENV_DISK: &str = "VMDISK_DISK";

/// File configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Task wait settings
    #[serde(default)]
    pub task: TaskConfig,

    /// govc settings
    #[serde(default)]
    pub govc: GovcConfig,

    /// File the settings were read from; `None` when defaults were used.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level filter (default: "vmdisk=info,vim=info")
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Reconfiguration task waiting
#[derive(Debug, Deserialize, Clone)]
pub struct TaskConfig {
    /// Give up on a task after this many seconds (default: 300)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Task status polling interval in milliseconds (default: 500)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GovcConfig {
    /// govc executable (default: govc on PATH)
    #[serde(default = "default_govc")]
    pub binary: PathBuf,
}

fn default_log_level() -> String {
    "vmdisk=info,vim=info".to_string()
}

fn default_timeout_secs() -> u64 {
    vim::DEFAULT_TASK_TIMEOUT.as_secs()
}

fn default_poll_interval_ms() -> u64 {
    vim::DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_govc() -> PathBuf {
    PathBuf::from(vim::DEFAULT_GOVC)
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for GovcConfig {
    fn default() -> Self {
        Self {
            binary: default_govc(),
        }
    }
}

impl TaskConfig {
    pub fn wait_config(&self) -> TaskWaitConfig {
        TaskWaitConfig::with_timeout(Duration::from_secs(self.timeout_secs))
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns default configuration. Nothing is
    /// logged; call [`Config::log_source`] once tracing is up.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e.to_string()))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.display().to_string(), e.to_string()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Report where the configuration came from.
    pub fn log_source(&self, requested: &Path) {
        match &self.source {
            Some(path) => tracing::info!("Loaded configuration from {:?}", path),
            None => tracing::debug!("Config file not found at {:?}, using defaults", requested),
        }
    }
}

/// Everything a relocation run needs, resolved once up front.
#[derive(Debug, Clone)]
pub struct Settings {
    pub connection: ConnectionConfig,
    /// Inventory path of the VM receiving the disk.
    pub target_vm: String,
    pub disk: DatastorePath,
    pub base_path: Option<String>,
    pub wait: TaskWaitConfig,
}

impl Settings {
    /// Resolve settings from parsed flags, the file config and an
    /// environment lookup. No remote call is made.
    pub fn resolve<F>(cli: &Cli, config: &Config, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.is_empty());

        let target_vm = lookup(ENV_TARGET).ok_or(ConfigError::MissingVariable {
            name: ENV_TARGET,
            what: "Target VM",
        })?;

        let disk_value = lookup(ENV_DISK).ok_or(ConfigError::MissingVariable {
            name: ENV_DISK,
            what: "Target disk",
        })?;
        let disk = disk_value
            .parse::<DatastorePath>()
            .map_err(|source| ConfigError::InvalidDisk { source })?;

        let base_path = lookup(ENV_BASEPATH);
        // Without a base path the scan root comes from the target's datacenter.
        vim::scan_root(base_path.as_deref(), &target_vm)
            .map_err(|source| ConfigError::InvalidTarget { source })?;

        let mut connection = ConnectionConfig::new(cli.url.clone())
            .with_insecure(cli.insecure)
            .with_govc(cli.govc.clone().unwrap_or_else(|| config.govc.binary.clone()));

        let username = lookup(ENV_USERNAME);
        let password = lookup(ENV_PASSWORD);
        if username.is_some() || password.is_some() {
            connection = connection.with_credentials(Credentials::new(
                username.unwrap_or_default(),
                password.unwrap_or_default(),
            ));
        }

        Ok(Self {
            connection,
            target_vm,
            disk,
            base_path,
            wait: config.task.wait_config(),
        })
    }
}

/// Interpret an environment boolean: true when it starts with `t`, `y` or `1`.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.chars().next().map(|c| c.to_ascii_lowercase()),
        Some('t' | 'y' | '1')
    )
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{what} must be specified with env var {name}")]
    MissingVariable {
        name: &'static str,
        what: &'static str,
    },

    #[error("VMDISK_DISK: {source}")]
    InvalidDisk { source: vim::Error },

    #[error("VMDISK_TARGET: {source}")]
    InvalidTarget { source: vim::Error },

    #[error("Failed to read config file '{0}': {1}")]
    ReadError(String, String),

    #[error("Failed to parse config file '{0}': {1}")]
    ParseError(String, String),
}
