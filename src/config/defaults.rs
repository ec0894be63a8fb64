//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_port() -> u16 {
    6667
}

pub fn default_true() -> bool {
    true
}

pub fn default_encoding() -> String {
    "utf-8".to_string()
}

pub fn default_max_line_length() -> usize {
    512
}

// =============================================================================
// Bot Defaults
// =============================================================================

pub fn default_cmd() -> String {
    "!".to_string()
}

pub fn default_rendezvous_timeout() -> u64 {
    30
}

pub fn default_plugins() -> Vec<String> {
    vec!["core".to_string(), "dcc".to_string()]
}

// =============================================================================
// DCC Defaults
// =============================================================================

pub fn default_dcc_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

pub fn default_dcc_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

pub fn default_block_size() -> usize {
    64 * 1024
}

pub fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

pub fn default_dcc_limit() -> usize {
    100
}

pub fn default_dcc_user_limit() -> usize {
    1
}

pub fn default_accept_timeout() -> u64 {
    60
}

pub fn default_idle_timeout() -> u64 {
    300
}
