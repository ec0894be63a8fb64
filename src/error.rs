//! Unified error handling for slirc-bot.
//!
//! Each concern gets its own `thiserror` enum; the binary folds them into
//! `anyhow` at the top level.

use slirc_proto::ProtocolError;
use thiserror::Error;

use crate::dcc::DccKind;

// ============================================================================
// Pattern Errors (registration time)
// ============================================================================

/// Errors raised while compiling an event pattern.
///
/// These are programming errors in the registering plugin and abort that
/// registration.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("unknown placeholder {{{0}}} in pattern")]
    UnknownPlaceholder(String),

    #[error("unbalanced brace at byte {0} in pattern")]
    UnbalancedBrace(usize),

    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
}

// ============================================================================
// Handler Errors (dispatch time)
// ============================================================================

/// Errors returned by event handlers.
///
/// The dispatcher logs these and carries on with the remaining handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("missing capture: {0}")]
    MissingField(&'static str),

    #[error("outbox closed")]
    OutboxClosed,

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Dcc(#[from] DccError),
}

impl HandlerError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::OutboxClosed => "outbox_closed",
            Self::Pattern(_) => "pattern",
            Self::Dcc(_) => "dcc",
        }
    }
}

// ============================================================================
// DCC Errors
// ============================================================================

/// Errors from the DCC connection manager.
#[derive(Debug, Error)]
pub enum DccError {
    #[error("unknown DCC type: {0}")]
    UnknownKind(String),

    #[error("connection refused: {0}")]
    Rejected(String),

    #[error("no {kind} connection for {peer} on port {port}")]
    NotFound {
        kind: DccKind,
        peer: String,
        port: u16,
    },

    #[error("DCC {0} needs a peer port to connect to")]
    MissingPort(DccKind),

    #[error("DCC {0} needs a file path")]
    MissingFile(DccKind),

    #[error("DCC {0} needs a peer address to connect to")]
    MissingAddress(DccKind),

    #[error("connection closed before it was ready")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

// ============================================================================
// Network Errors
// ============================================================================

/// Errors on the server link.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),
}

// ============================================================================
// Plugin Errors
// ============================================================================

/// Errors raised while loading plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("unknown plugin: {0}")]
    Unknown(String),

    #[error("plugin dependency cycle through {0}")]
    Cycle(String),

    #[error("plugin {plugin} failed to register: {source}")]
    Register {
        plugin: &'static str,
        #[source]
        source: PatternError,
    },
}
