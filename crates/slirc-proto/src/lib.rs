//! # slirc-proto
//!
//! Wire-level helpers for the slirc bot toolkit.
//!
//! ## Features
//!
//! - Line framing with configurable text encoding (tokio codec and a plain
//!   incremental framer)
//! - Protocol strings with nick/host/channel accessors
//! - CTCP quoting
//! - DCC control messages (offers, resume, accept)
//! - Splitting long message bodies into wire-sized fragments
//!
//! ## Quick Start
//!
//! ```rust
//! use slirc_proto::{IrcString, dcc::DccMessage};
//!
//! let payload = "\x01DCC SEND report.pdf 2130706433 5000 2048\x01";
//! if let Ok(DccMessage::Send { filename, port, .. }) = DccMessage::parse(payload) {
//!     assert_eq!(filename, "report.pdf");
//!     assert_eq!(port, 5000);
//! }
//!
//! let source = IrcString::from("alice!a@example.org");
//! assert_eq!(source.nick(), Some("alice"));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod ctcp;
pub mod dcc;
pub mod error;
pub mod ircstr;
#[cfg(feature = "tokio")]
pub mod line;
pub mod split;

pub use self::dcc::DccMessage;
pub use self::error::{DccParseError, ProtocolError};
pub use self::ircstr::IrcString;
#[cfg(feature = "tokio")]
pub use self::line::{LineCodec, LineFramer};
