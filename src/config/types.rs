//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;
use super::validation::{self, ValidationError};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Invalid(Vec<ValidationError>),
}

/// Client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Chat (IRC) connection.
    #[serde(default)]
    pub chat: ChatConfig,
    /// PubSub (WebSocket) connection. Omit to run chat only.
    pub pubsub: Option<PubSubConfig>,
    /// Reconnect behaviour shared by both clients.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// REST API used to resolve the login before connecting.
    pub api: Option<ApiConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load and validate in one step.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Validate this configuration, returning all errors found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        validation::validate(self)
    }
}

/// Chat server connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_host")]
    pub host: String,
    #[serde(default = "default_chat_port")]
    pub port: u16,
    /// Wrap the TCP stream in TLS.
    #[serde(default = "default_true")]
    pub tls: bool,
    /// Login name. Anonymous (`justinfanNNNN`) when unset.
    pub login: Option<String>,
    /// OAuth token, with or without the `oauth:` prefix.
    pub oauth_token: Option<String>,
    /// Capabilities requested during the handshake.
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,
    /// Channels joined once the session is ready.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Seconds allowed for the transport to connect.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Seconds an open transport may wait for the welcome before it is
    /// treated as dead.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout: u64,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            host: default_chat_host(),
            port: default_chat_port(),
            tls: true,
            login: None,
            oauth_token: None,
            capabilities: default_capabilities(),
            channels: Vec::new(),
            connect_timeout: default_connect_timeout(),
            ready_timeout: default_ready_timeout(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl ChatConfig {
    /// `host:port` of the chat server.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout)
    }
}

/// PubSub connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PubSubConfig {
    #[serde(default = "default_pubsub_url")]
    pub url: String,
    /// Token sent with every LISTEN/UNLISTEN.
    pub auth_token: Option<String>,
    /// Topics subscribed once the connection is up.
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "HeartbeatConfig::pubsub")]
    pub heartbeat: HeartbeatConfig,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            url: default_pubsub_url(),
            auth_token: None,
            topics: Vec::new(),
            heartbeat: HeartbeatConfig::pubsub(),
        }
    }
}

/// Heartbeat (ping/pong) configuration for one transport.
///
/// Every `interval_secs` a ping is sent; if no pong arrives within
/// `timeout_secs` the connection is considered dead and a reconnect starts.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_heartbeat_timeout")]
    pub timeout_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_heartbeat_interval(),
            timeout_secs: default_heartbeat_timeout(),
        }
    }
}

impl HeartbeatConfig {
    /// Defaults for a PubSub connection.
    pub fn pubsub() -> Self {
        Self {
            interval_secs: default_pubsub_heartbeat_interval(),
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Reconnect behaviour.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReconnectConfig {
    /// Re-join channels and re-LISTEN topics after a reconnect, before
    /// `Reconnected` is raised.
    #[serde(default = "default_true")]
    pub replay_subscriptions: bool,
    /// Reconnect when the server closes the stream; otherwise a remote close
    /// is terminal.
    #[serde(default = "default_true")]
    pub on_remote_close: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            replay_subscriptions: true,
            on_remote_close: true,
        }
    }
}

/// REST API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    pub client_id: String,
    /// Bearer token; falls back to `chat.oauth_token` when unset.
    pub oauth_token: Option<String>,
}
