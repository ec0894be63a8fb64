//! The IRC server link.
//!
//! - [`connection`]: registration, read loop into the dispatcher and write
//!   loop draining the outbox
//! - [`tls`]: optional TLS wrapping of the TCP stream

mod connection;
pub mod tls;

pub use crate::error::NetworkError;
pub use connection::{drive, run};
