//! Span constructors for the server link, DCC connections and dispatch.

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    use crate::dcc::DccKind;
    use crate::handlers::{Direction, HandlerId};

    /// Span for the IRC server connection.
    pub fn connection(host: &str, port: u16, nick: &str) -> Span {
        info_span!("connection", host = %host, port, nick = %nick)
    }

    /// Span for one DCC connection.
    pub fn dcc(kind: DccKind, peer: &str, port: u16) -> Span {
        info_span!("dcc", kind = %kind, peer = %peer, port)
    }

    /// Span for one handler invocation.
    pub fn dispatch(direction: Direction, handler: HandlerId) -> Span {
        debug_span!("dispatch", direction = %direction, handler = %handler)
    }
}
