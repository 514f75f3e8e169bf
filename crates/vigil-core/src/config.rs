//! Configuration system for vigil.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $VIGIL_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/vigil/config.toml
//!   3. ~/.config/vigil/config.toml
//!
//! One record carries the notifier credential and all four endpoint
//! addresses. It is passed whole across every spawn boundary: the
//! supervisor hands the file path to the relay, the relay hands it to the
//! watcher, and each process layers its own env overrides on top.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub notifier: NotifierConfig,
    pub endpoints: EndpointConfig,
    pub watcher: WatcherConfig,
    pub supervise: SuperviseConfig,
    pub commands: CommandConfig,

    /// Where this config was loaded from. Forwarded to spawned children.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Bot credential for the notification front-end.
    pub bot_token: String,
    /// Destination chat/channel identifier.
    pub chat_id: String,
    /// Front-end API base. Swap for a mock server in tests.
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// UDP address the relay receives evidence frames on.
    pub image_addr: SocketAddr,
    /// TCP address the relay listens on for the watcher's kill connection.
    pub kill_addr: SocketAddr,
    /// TCP address the supervisor listens on for the relay's control connection.
    pub control_addr: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Minimum seconds between evidence sends.
    pub send_interval_secs: u64,
    /// Capture loop yield between iterations, in milliseconds.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuperviseConfig {
    /// Grace period before a stopped child is force-killed, in seconds.
    pub grace_secs: u64,
    /// Child liveness poll cadence during the grace period, in milliseconds.
    pub poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Command the supervisor spawns for the relay.
    pub relay: Vec<String>,
    /// Command the relay spawns for the edge watcher.
    pub watcher: Vec<String>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            notifier: NotifierConfig::default(),
            endpoints: EndpointConfig::default(),
            watcher: WatcherConfig::default(),
            supervise: SuperviseConfig::default(),
            commands: CommandConfig::default(),
            path: None,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            image_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 12345),
            kill_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 12346),
            control_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 12347),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            send_interval_secs: 5,
            poll_interval_ms: 100,
        }
    }
}

impl Default for SuperviseConfig {
    fn default() -> Self {
        Self {
            grace_secs: 5,
            poll_ms: 500,
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            relay: vec!["vigild".to_string()],
            watcher: vec!["vigil-watch".to_string()],
        }
    }
}

// ── Duration helpers ──────────────────────────────────────────────────────────

impl WatcherConfig {
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl SuperviseConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_or_tmp().join(".config"))
        .join("vigil")
}

fn home_or_tmp() -> PathBuf {
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

impl VigilConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit path, then apply env overrides.
    /// A missing file yields defaults, not an error.
    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            VigilConfig::default()
        };
        config.path = Some(path.clone());
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("VIGIL_CONFIG")
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
            let text = toml::to_string_pretty(&VigilConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply VIGIL_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VIGIL_NOTIFIER__BOT_TOKEN") {
            self.notifier.bot_token = v;
        }
        if let Ok(v) = std::env::var("VIGIL_NOTIFIER__CHAT_ID") {
            self.notifier.chat_id = v;
        }
        if let Ok(v) = std::env::var("VIGIL_NOTIFIER__API_BASE") {
            self.notifier.api_base = v;
        }
        if let Ok(v) = std::env::var("VIGIL_ENDPOINTS__IMAGE_ADDR") {
            if let Ok(a) = v.parse() {
                self.endpoints.image_addr = a;
            }
        }
        if let Ok(v) = std::env::var("VIGIL_ENDPOINTS__KILL_ADDR") {
            if let Ok(a) = v.parse() {
                self.endpoints.kill_addr = a;
            }
        }
        if let Ok(v) = std::env::var("VIGIL_ENDPOINTS__CONTROL_ADDR") {
            if let Ok(a) = v.parse() {
                self.endpoints.control_addr = a;
            }
        }
        if let Ok(v) = std::env::var("VIGIL_WATCHER__SEND_INTERVAL_SECS") {
            if let Ok(s) = v.parse() {
                self.watcher.send_interval_secs = s;
            }
        }
        if let Ok(v) = std::env::var("VIGIL_SUPERVISE__GRACE_SECS") {
            if let Ok(s) = v.parse() {
                self.supervise.grace_secs = s;
            }
        }
    }
}
