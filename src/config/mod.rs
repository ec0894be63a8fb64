//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, BotConfig)
//! - [`dcc`]: DCC limits, timeouts and transfer tuning (DccConfig, DccTypeConfig)
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup checks collecting every problem found

mod dcc;
mod defaults;
mod types;
pub mod validation;

pub use dcc::{DccConfig, DccTypeConfig};
pub use types::{BotConfig, Config, ConfigError, ServerConfig};
pub use validation::{ValidationError, validate};
