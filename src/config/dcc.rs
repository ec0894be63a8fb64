//! DCC configuration: per-type limits and timeouts, send tuning.

use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::{
    default_accept_timeout, default_block_size, default_dcc_bind, default_dcc_ip,
    default_dcc_limit, default_dcc_user_limit, default_download_dir, default_idle_timeout,
};
use crate::dcc::DccKind;

/// DCC subsystem configuration.
///
/// ```toml
/// [dcc]
/// ip = "203.0.113.7"
/// send_rate = 65536
///
/// [dcc.send]
/// limit = 10
/// user_limit = 2
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DccConfig {
    /// Externally visible address announced in offers.
    #[serde(default = "default_dcc_ip")]
    pub ip: IpAddr,
    /// Local address listeners bind to.
    #[serde(default = "default_dcc_bind")]
    pub bind: IpAddr,
    /// Send throughput cap in bytes per second; 0 means unlimited.
    #[serde(default)]
    pub send_rate: u32,
    /// Bytes read from the source file per send step.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Where auto-accepted files are written.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Accept incoming CHAT and SEND offers without asking.
    #[serde(default)]
    pub auto_accept: bool,
    /// Chat connection limits.
    #[serde(default)]
    pub chat: DccTypeConfig,
    /// Get (receive) connection limits.
    #[serde(default)]
    pub get: DccTypeConfig,
    /// Send connection limits.
    #[serde(default)]
    pub send: DccTypeConfig,
}

impl DccConfig {
    /// Limits and timeouts for one connection type.
    pub fn for_kind(&self, kind: DccKind) -> &DccTypeConfig {
        match kind {
            DccKind::Chat => &self.chat,
            DccKind::Get => &self.get,
            DccKind::Send => &self.send,
        }
    }
}

impl Default for DccConfig {
    fn default() -> Self {
        Self {
            ip: default_dcc_ip(),
            bind: default_dcc_bind(),
            send_rate: 0,
            block_size: default_block_size(),
            download_dir: default_download_dir(),
            auto_accept: false,
            chat: DccTypeConfig::default(),
            get: DccTypeConfig::default(),
            send: DccTypeConfig::default(),
        }
    }
}

/// Per-type connection limits and timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct DccTypeConfig {
    /// Concurrent connections of this type (default: 100, 0 = unlimited).
    #[serde(default = "default_dcc_limit")]
    pub limit: usize,
    /// Concurrent connections of this type per peer (default: 1, 0 = unlimited).
    #[serde(default = "default_dcc_user_limit")]
    pub user_limit: usize,
    /// Seconds to wait for the socket to be established (default: 60).
    #[serde(default = "default_accept_timeout")]
    pub accept_timeout: u64,
    /// Seconds without inbound bytes before closing (default: 300).
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
}

impl DccTypeConfig {
    pub fn accept_timeout(&self) -> Duration {
        Duration::from_secs(self.accept_timeout)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }
}

impl Default for DccTypeConfig {
    fn default() -> Self {
        Self {
            limit: default_dcc_limit(),
            user_limit: default_dcc_user_limit(),
            accept_timeout: default_accept_timeout(),
            idle_timeout: default_idle_timeout(),
        }
    }
}
