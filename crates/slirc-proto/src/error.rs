//! Error types for the IRC wire helpers.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested text encoding label is not known to `encoding_rs`.
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    /// A DCC control message could not be parsed.
    #[error("invalid DCC message: {string}")]
    InvalidDcc {
        /// The offending CTCP payload.
        string: String,
        /// What was wrong with it.
        cause: DccParseError,
    },
}

/// Reasons a DCC control message fails to parse.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DccParseError {
    /// Payload does not start with `DCC`.
    #[error("not a DCC message")]
    NotDcc,
    /// Too few arguments for the given DCC type.
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    /// Address is neither a 32-bit integer nor an IP literal.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// A numeric field (port, size, position) did not parse.
    #[error("invalid number in {field}: {value}")]
    InvalidNumber {
        /// Field name.
        field: &'static str,
        /// Raw value.
        value: String,
    },
    /// DCC subcommand not understood.
    #[error("unsupported DCC type: {0}")]
    Unsupported(String),
}
