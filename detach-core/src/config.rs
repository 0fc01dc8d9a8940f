//! Daemon configuration file I/O
//!
//! Loads the daemon configuration from a TOML file in the user's
//! configuration directory. Every field has a default, so a missing file
//! yields a working daemon on the well-known port.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, DetachError};

/// Well-known control port
pub const DEFAULT_PORT: u16 = 2046;

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// TCP port the control socket listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Explicit bind address. When unset, the first address obtained by
    /// resolving the local hostname is used.
    #[serde(default)]
    pub bind_address: Option<String>,

    /// Directory receiving the per-process output and error files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// How long a cancel request waits for the supervisor to react before
    /// responding, in milliseconds
    #[serde(default = "default_cancel_delay_ms")]
    pub cancel_delay_ms: u64,

    /// Grace period granted to outstanding processes at shutdown, in
    /// milliseconds
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("logs/processes")
}

fn default_cancel_delay_ms() -> u64 {
    500
}

fn default_shutdown_grace_ms() -> u64 {
    5000
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: None,
            output_dir: default_output_dir(),
            cancel_delay_ms: default_cancel_delay_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl DaemonConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "output_dir must not be empty".to_string(),
            });
        }
        if self.shutdown_grace_ms == 0 {
            return Err(ConfigError::ValidationError {
                message: "shutdown_grace_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Get the configuration directory
///
/// Returns ~/.config/detach, or the DETACH_CONFIG_DIR environment variable
/// if set (used by tests and non-standard deployments).
pub fn get_config_dir() -> Result<PathBuf, DetachError> {
    if let Ok(config_dir) = std::env::var("DETACH_CONFIG_DIR") {
        return Ok(PathBuf::from(config_dir));
    }

    let home = std::env::var("HOME").map_err(|_| {
        DetachError::Config(ConfigError::IoError {
            message: "HOME environment variable is not set".to_string(),
        })
    })?;
    Ok(Path::new(&home).join(".config").join("detach"))
}

/// Load the daemon configuration from the default configuration directory
pub fn load_config() -> Result<DaemonConfig, DetachError> {
    load_config_from(&get_config_dir()?)
}

/// Load the daemon configuration from `dir`, falling back to defaults when
/// no configuration file exists there
pub fn load_config_from(dir: &Path) -> Result<DaemonConfig, DetachError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        debug!("No configuration file at {}, using defaults", path.display());
        return Ok(DaemonConfig::default());
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| {
        DetachError::Config(ConfigError::IoError {
            message: format!("Failed to read config file: {}", e),
        })
    })?;
    let config: DaemonConfig = toml::from_str(&contents).map_err(|e| {
        DetachError::Config(ConfigError::ValidationError {
            message: format!("Failed to parse config file: {}", e),
        })
    })?;
    config.validate()?;
    Ok(config)
}
