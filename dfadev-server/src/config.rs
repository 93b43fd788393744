//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via DFADEV_CONFIG)
//! 3. Environment variables

use crate::lifecycle::InitMode;
use dfadev_protocol::{DEFAULT_PORT, MAX_PAYLOAD_SIZE};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Device configuration.
    pub device: DeviceConfig,
    /// Lifecycle configuration.
    pub lifecycle: LifecycleConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("DFADEV_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

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

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.device.apply_env_overrides();
        self.lifecycle.apply_env_overrides();
    }

    /// Checks limits that would make the device unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.max_write_bytes == 0 {
            return Err(ConfigError::Validation(
                "device.max_write_bytes must be greater than 0".to_string(),
            ));
        }
        if self.device.max_write_bytes > MAX_PAYLOAD_SIZE as usize {
            return Err(ConfigError::Validation(format!(
                "device.max_write_bytes must not exceed {}",
                MAX_PAYLOAD_SIZE
            )));
        }
        if self.device.queue_depth == 0 {
            return Err(ConfigError::Validation(
                "device.queue_depth must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            idle_timeout_secs: 300,
            max_connections: 64,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("DFADEV_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("DFADEV_IDLE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.idle_timeout_secs = secs;
            }
        }

        if let Ok(max) = std::env::var("DFADEV_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse() {
                self.max_connections = n;
            }
        }
    }

    /// Returns idle timeout as Duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Maximum bytes consumed by a single WRITE.
    pub max_write_bytes: usize,
    /// Capacity of the device actor's command queue.
    pub queue_depth: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            max_write_bytes: 4096,
            queue_depth: 1024,
        }
    }
}

impl DeviceConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(max) = std::env::var("DFADEV_MAX_WRITE_BYTES") {
            if let Ok(n) = max.parse() {
                self.max_write_bytes = n;
            }
        }

        if let Ok(depth) = std::env::var("DFADEV_QUEUE_DEPTH") {
            if let Ok(n) = depth.parse() {
                self.queue_depth = n;
            }
        }
    }
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Directory of the snapshot store used for handoff.
    pub state_dir: PathBuf,
    /// How the automaton is initialized at startup.
    pub init_mode: InitMode,
    /// Publish a snapshot when the server stops on a signal.
    pub save_on_shutdown: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("./state"),
            init_mode: InitMode::LiveUpdate,
            save_on_shutdown: true,
        }
    }
}

impl LifecycleConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("DFADEV_STATE_DIR") {
            self.state_dir = PathBuf::from(dir);
        }

        if let Ok(mode) = std::env::var("DFADEV_INIT_MODE") {
            match mode.parse() {
                Ok(parsed) => self.init_mode = parsed,
                Err(e) => tracing::warn!("Ignoring DFADEV_INIT_MODE: {}", e),
            }
        }

        if let Ok(save) = std::env::var("DFADEV_SAVE_ON_SHUTDOWN") {
            self.save_on_shutdown = save == "1" || save.to_lowercase() == "true";
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {}", .0.display(), .1)]
    Parse(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Custom serde module for SocketAddr (to handle as string in YAML).
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr.port(), 7411);
        assert_eq!(config.network.max_connections, 64);
        assert_eq!(config.device.max_write_bytes, 4096);
        assert_eq!(config.device.queue_depth, 1024);
        assert_eq!(config.lifecycle.init_mode, InitMode::LiveUpdate);
        assert!(config.lifecycle.save_on_shutdown);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.network.bind_addr, config.network.bind_addr);
        assert_eq!(parsed.lifecycle.state_dir, config.lifecycle.state_dir);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "device:\n  max_write_bytes: 16\nlifecycle:\n  init_mode: fresh\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.device.max_write_bytes, 16);
        assert_eq!(config.device.queue_depth, 1024);
        assert_eq!(config.lifecycle.init_mode, InitMode::Fresh);
        assert_eq!(config.network.idle_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_file_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dfadev.yaml");

        let mut config = Config::default();
        config.network.bind_addr = "0.0.0.0:9000".parse().unwrap();
        config.lifecycle.init_mode = InitMode::Restart;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.network.bind_addr.port(), 9000);
        assert_eq!(loaded.lifecycle.init_mode, InitMode::Restart);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/dfadev.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
        assert!(err.to_string().contains("dfadev.yaml"));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.device.max_write_bytes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.device.max_write_bytes = MAX_PAYLOAD_SIZE as usize + 1;
        assert!(config.validate().is_err());

        config.device.max_write_bytes = 1;
        config.device.queue_depth = 0;
        assert!(config.validate().is_err());
    }
}
