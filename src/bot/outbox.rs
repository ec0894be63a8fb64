//! Outgoing server lines.

use slirc_proto::ctcp;
use slirc_proto::split::split;
use tokio::sync::mpsc;

use crate::error::HandlerError;

/// Room left for the `:nick!user@host ` prefix the server adds when relaying.
const PREFIX_RESERVE: usize = 100;

/// Handle for queueing lines to the server.
///
/// Every line goes through the outbound dispatch pass before it reaches the
/// socket.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<String>,
    max_line_length: usize,
}

impl Outbox {
    pub(crate) fn new(tx: mpsc::UnboundedSender<String>, max_line_length: usize) -> Self {
        Self {
            tx,
            max_line_length,
        }
    }

    /// Queue one raw line, without terminator.
    pub fn send_line(&self, line: impl Into<String>) -> Result<(), HandlerError> {
        self.tx.send(line.into()).map_err(|_| HandlerError::OutboxClosed)
    }

    pub fn privmsg(&self, target: &str, text: &str) -> Result<(), HandlerError> {
        self.split_send("PRIVMSG", target, text)
    }

    pub fn notice(&self, target: &str, text: &str) -> Result<(), HandlerError> {
        self.split_send("NOTICE", target, text)
    }

    /// Send a CTCP request, e.g. `ctcp("bob", "VERSION")`.
    pub fn ctcp(&self, target: &str, payload: &str) -> Result<(), HandlerError> {
        self.send_line(format!("PRIVMSG {target} :{}", ctcp::quote(payload)))
    }

    /// Send a CTCP reply.
    pub fn ctcp_reply(&self, target: &str, payload: &str) -> Result<(), HandlerError> {
        self.send_line(format!("NOTICE {target} :{}", ctcp::quote(payload)))
    }

    pub fn action(&self, target: &str, text: &str) -> Result<(), HandlerError> {
        self.send_line(format!("PRIVMSG {target} :{}", ctcp::action(text)))
    }

    pub fn join(&self, channel: &str) -> Result<(), HandlerError> {
        self.send_line(format!("JOIN {channel}"))
    }

    fn split_send(&self, command: &str, target: &str, text: &str) -> Result<(), HandlerError> {
        let overhead = command.len() + target.len() + 4 + PREFIX_RESERVE;
        let budget = self.max_line_length.saturating_sub(overhead);
        for chunk in split(text, budget) {
            self.send_line(format!("{command} {target} :{chunk}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbox(max: usize) -> (Outbox, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Outbox::new(tx, max), rx)
    }

    #[test]
    fn ctcp_is_quoted() {
        let (outbox, mut rx) = outbox(512);
        outbox.ctcp("bob", "VERSION").unwrap();
        outbox.ctcp_reply("bob", "VERSION slircbot").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG bob :\x01VERSION\x01");
        assert_eq!(rx.try_recv().unwrap(), "NOTICE bob :\x01VERSION slircbot\x01");
    }

    #[test]
    fn long_privmsg_is_split() {
        let (outbox, mut rx) = outbox(130);
        let text = "word ".repeat(20);
        outbox.privmsg("#chan", text.trim_end()).unwrap();

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.starts_with("PRIVMSG #chan :"));
            assert!(line.len() <= 130);
        }
    }

    #[test]
    fn closed_outbox_errors() {
        let (outbox, rx) = outbox(512);
        drop(rx);
        assert!(matches!(outbox.send_line("PING"), Err(HandlerError::OutboxClosed)));
    }
}
