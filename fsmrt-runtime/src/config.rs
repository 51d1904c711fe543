//! Runtime configuration.
//!
//! Configuration is resolved in the following order (later overrides
//! earlier):
//! 1. Default values
//! 2. YAML config file (if specified via FSMRT_CONFIG)
//! 3. Environment variables (FSMRT_BIND, FSMRT_PEER)
//! 4. CLI arguments (applied by the binary)

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Runtime configuration for one engine process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local UDP bind address for the control channel.
    pub bind_addr: SocketAddr,

    /// Peer address snapshots are sent to.
    pub peer_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:45454".parse().unwrap(),
            peer_addr: "127.0.0.1:45455".parse().unwrap(),
        }
    }
}

impl Config {
    /// Loads configuration from file if FSMRT_CONFIG is set, then applies
    /// environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("FSMRT_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("FSMRT_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }
        if let Ok(addr) = std::env::var("FSMRT_PEER") {
            if let Ok(parsed) = addr.parse() {
                self.peer_addr = parsed;
            }
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    Io(PathBuf, std::io::Error),

    #[error("failed to parse config file '{0}': {1}")]
    Parse(PathBuf, String),
}
