//! Core configuration types and loading.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::dcc::DccConfig;
use super::defaults::{
    default_cmd, default_encoding, default_max_line_length, default_plugins, default_port,
    default_rendezvous_timeout, default_true,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// IRC server connection settings.
    pub server: ServerConfig,
    /// Dispatcher and plugin settings.
    #[serde(default)]
    pub bot: BotConfig,
    /// Extra values available to event patterns as `{name}` placeholders.
    #[serde(default)]
    pub vars: HashMap<String, String>,
    /// DCC subsystem configuration.
    #[serde(default)]
    pub dcc: DccConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// IRC server connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server hostname (e.g., "irc.libera.chat").
    pub host: String,
    /// Server port (default: 6667).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Wrap the connection in TLS.
    #[serde(default)]
    pub tls: bool,
    /// Verify the server certificate against the system roots (default: true).
    #[serde(default = "default_true")]
    pub verify_tls: bool,
    /// Nickname to register with.
    pub nick: String,
    /// Username for USER (defaults to the nick).
    pub username: Option<String>,
    /// Realname for USER (defaults to the nick).
    pub realname: Option<String>,
    /// Connection password sent as PASS.
    pub password: Option<String>,
    /// Text encoding of the link (default: utf-8).
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Maximum outgoing line length in bytes (default: 512).
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Channels joined once registration completes.
    #[serde(default)]
    pub autojoins: Vec<String>,
}

impl ServerConfig {
    /// Username sent in USER.
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nick)
    }

    /// Realname sent in USER.
    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or(&self.nick)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_port(),
            tls: false,
            verify_tls: true,
            nick: "slircbot".to_string(),
            username: None,
            realname: None,
            password: None,
            encoding: default_encoding(),
            max_line_length: default_max_line_length(),
            autojoins: Vec::new(),
        }
    }
}

/// Dispatcher and plugin configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Command prefix, available to patterns as `{cmd}` (default: "!").
    #[serde(default = "default_cmd")]
    pub cmd: String,
    /// Default rendezvous timeout in seconds (default: 30).
    #[serde(default = "default_rendezvous_timeout")]
    pub rendezvous_timeout: u64,
    /// Plugins to load, in addition to whatever they require.
    #[serde(default = "default_plugins")]
    pub plugins: Vec<String>,
}

impl BotConfig {
    /// Default rendezvous timeout as a `Duration`.
    pub fn rendezvous_timeout(&self) -> Duration {
        Duration::from_secs(self.rendezvous_timeout)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            cmd: default_cmd(),
            rendezvous_timeout: default_rendezvous_timeout(),
            plugins: default_plugins(),
        }
    }
}
