//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use slirc_proto::{IrcString, LineCodec};
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.host is required")]
    MissingHost,
    #[error("server.port must not be 0")]
    InvalidPort,
    #[error("server.nick is not a valid nickname: '{0}'")]
    InvalidNick(String),
    #[error("server.encoding is not a known encoding: '{0}'")]
    UnknownEncoding(String),
    #[error("server.max_line_length must be at least 64, got {0}")]
    LineLengthTooSmall(usize),
    #[error("bot.cmd must not be empty")]
    EmptyCommandPrefix,
    #[error("vars.{0} shadows a built-in placeholder")]
    ReservedVar(String),
    #[error("dcc.block_size must not be 0")]
    ZeroBlockSize,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.host.is_empty() {
        errors.push(ValidationError::MissingHost);
    }
    if config.server.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }
    if !IrcString::from(config.server.nick.as_str()).is_nick() {
        errors.push(ValidationError::InvalidNick(config.server.nick.clone()));
    }
    if LineCodec::new(&config.server.encoding).is_err() {
        errors.push(ValidationError::UnknownEncoding(config.server.encoding.clone()));
    }
    if config.server.max_line_length < 64 {
        errors.push(ValidationError::LineLengthTooSmall(config.server.max_line_length));
    }

    if config.bot.cmd.is_empty() {
        errors.push(ValidationError::EmptyCommandPrefix);
    }
    for name in config.vars.keys() {
        if name == "nick" || name == "cmd" {
            errors.push(ValidationError::ReservedVar(name.clone()));
        }
    }

    if config.dcc.block_size == 0 {
        errors.push(ValidationError::ZeroBlockSize);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> String {
        r#"
[server]
host = "irc.example.net"
nick = "slircbot"
"#
        .to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        let config = Config::parse(&minimal_valid_config()).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_bad_nick_and_encoding_fail_together() {
        let toml = r#"
[server]
host = "irc.example.net"
nick = "9lives"
encoding = "klingon"
"#;
        let config = Config::parse(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidNick(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownEncoding(_))));
    }

    #[test]
    fn test_reserved_var_fails() {
        let toml = r#"
[server]
host = "irc.example.net"
nick = "bot"

[vars]
nick = "other"
"#;
        let config = Config::parse(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::ReservedVar(n) if n == "nick")));
    }

    #[test]
    fn test_zero_block_size_fails() {
        let toml = r#"
[server]
host = "irc.example.net"
nick = "bot"

[dcc]
block_size = 0
"#;
        let config = Config::parse(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::ZeroBlockSize)));
    }
}
