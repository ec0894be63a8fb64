//! DCC connection manager and transfer protocols.
//!
//! The manager admits, indexes and tracks direct peer connections. Each
//! connection runs one [`Transfer`] over its socket: line-oriented chat, or
//! file get/send with 4-byte cumulative acknowledgements.

mod chat;
mod connection;
mod get;
mod limits;
mod manager;
mod send;

pub use connection::{CloseReason, DccConnection, DccState};
pub use limits::Admission;
pub use manager::{DccManager, DccParams};

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::error::DccError;
use crate::handlers::Dispatcher;

/// Connection type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DccKind {
    Chat,
    /// Receiving a file.
    Get,
    /// Offering a file.
    Send,
}

impl DccKind {
    pub const ALL: [DccKind; 3] = [Self::Chat, Self::Get, Self::Send];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Get => "get",
            Self::Send => "send",
        }
    }
}

impl fmt::Display for DccKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DccKind {
    type Err = DccError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "get" => Ok(Self::Get),
            "send" => Ok(Self::Send),
            _ => Err(DccError::UnknownKind(s.to_string())),
        }
    }
}

/// What a running transfer needs besides its socket.
#[derive(Clone)]
pub(crate) struct TransferContext {
    pub dispatcher: Dispatcher,
    pub encoding: String,
    pub idle_timeout: Option<Duration>,
    pub block_size: usize,
    pub send_rate: u32,
}

/// The byte loop of one established connection.
#[async_trait]
pub(crate) trait Transfer: Send {
    /// Drive the socket until the transfer ends, returning why.
    async fn run(
        self: Box<Self>,
        stream: TcpStream,
        conn: &DccConnection,
        ctx: &TransferContext,
    ) -> CloseReason;
}

pub(crate) fn transfer_for(kind: DccKind) -> Box<dyn Transfer> {
    match kind {
        DccKind::Chat => Box::new(chat::ChatSession),
        DccKind::Get => Box::new(get::GetSession),
        DccKind::Send => Box::new(send::SendSession),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("CHAT".parse::<DccKind>().unwrap(), DccKind::Chat);
        assert_eq!("send".parse::<DccKind>().unwrap(), DccKind::Send);
        assert!(matches!(
            "xfer".parse::<DccKind>(),
            Err(DccError::UnknownKind(k)) if k == "xfer"
        ));
    }

    #[test]
    fn kind_displays_lowercase() {
        let names: Vec<String> = DccKind::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["chat", "get", "send"]);
    }
}
