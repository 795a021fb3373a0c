//! Configuration system for Beacon.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $BEACON_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/beacon/config.toml
//!   3. ~/.config/beacon/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default listen port for the relay.
pub const DEFAULT_PORT: u16 = 8080;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    pub network: NetworkConfig,
    pub identity: IdentityConfig,
    pub timing: TimingConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind the WebSocket/HTTP listener on.
    pub bind_addr: String,
    /// Listen port, shared by the WebSocket and the status endpoint.
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Prefix of assigned node ids, e.g. "node" → "node-k3v9x0qa".
    pub id_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// WebSocket ping cadence per connection.
    pub heartbeat_interval_secs: u64,
    /// Liveness sweep cadence.
    pub sweep_interval_secs: u64,
    /// A node not heard from for longer than this is evicted.
    pub stale_after_ms: u64,
    /// Delay between the welcome frame and the first peer-list.
    pub peer_list_delay_ms: u64,
    /// How long shutdown waits for peers to close.
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Text carried in the welcome frame.
    pub welcome_message: String,
    /// Text carried in the server-shutdown frame.
    pub shutdown_message: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            id_prefix: "node".to_string(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 30,
            sweep_interval_secs: 60,
            stale_after_ms: 60_000,
            peer_list_delay_ms: 1_000,
            shutdown_grace_secs: 5,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            welcome_message: "Connected to beacon signaling relay".to_string(),
            shutdown_message: "Server is shutting down".to_string(),
        }
    }
}

impl TimingConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn peer_list_delay(&self) -> Duration {
        Duration::from_millis(self.peer_list_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("beacon")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BeaconConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            BeaconConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file without applying env overrides.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BEACON_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&BeaconConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply BEACON_* overrides. `PORT` is honoured too, for PaaS hosts.
    ///
    /// `lookup` is injected so tests don't touch the process environment.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BEACON_NETWORK__BIND_ADDR") {
            self.network.bind_addr = v;
        }
        if let Some(p) = lookup("PORT").and_then(|v| v.parse().ok()) {
            self.network.port = p;
        }
        if let Some(p) = lookup("BEACON_NETWORK__PORT").and_then(|v| v.parse().ok()) {
            self.network.port = p;
        }
        if let Some(v) = lookup("BEACON_IDENTITY__ID_PREFIX") {
            if !v.is_empty() {
                self.identity.id_prefix = v;
            }
        }
        if let Some(s) = lookup("BEACON_TIMING__HEARTBEAT_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.timing.heartbeat_interval_secs = s;
        }
        if let Some(s) = lookup("BEACON_TIMING__SWEEP_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.timing.sweep_interval_secs = s;
        }
        if let Some(ms) = lookup("BEACON_TIMING__STALE_AFTER_MS").and_then(|v| v.parse().ok()) {
            self.timing.stale_after_ms = ms;
        }
    }
}
