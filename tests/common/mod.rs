//! Integration test common infrastructure.
//!
//! Provides a bot wired to an in-memory outbox, a scripted IRC server for
//! socket-level tests, and a DCC peer for transfer tests.

#![allow(dead_code)]

pub mod peer;
pub mod server;

#[allow(unused_imports)]
pub use peer::TestPeer;
#[allow(unused_imports)]
pub use server::TestServer;

use slirc_bot::handlers::{Event, Fields, HandlerResult, Reply};
use slirc_bot::{Bot, Config, WireReceiver};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Configuration for tests: local DCC, short timeouts.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.nick = "slircbot".to_string();
    config.dcc.bind = LOCALHOST;
    config.dcc.block_size = 1024;
    for limits in [&mut config.dcc.chat, &mut config.dcc.get, &mut config.dcc.send] {
        limits.accept_timeout = 5;
        limits.idle_timeout = 5;
    }
    config
}

/// Start a bot with [`test_config`].
pub fn start_bot() -> (Arc<Bot>, WireReceiver) {
    Bot::start(test_config())
}

/// Next line the bot wrote to the server.
pub async fn next_line(wire: &mut WireReceiver) -> String {
    timeout(Duration::from_secs(5), wire.recv())
        .await
        .expect("timed out waiting for an outgoing line")
        .expect("wire closed")
}

/// Skip outgoing lines until one starts with `prefix`.
pub async fn line_starting(wire: &mut WireReceiver, prefix: &str) -> String {
    loop {
        let line = next_line(wire).await;
        if line.starts_with(prefix) {
            return line;
        }
    }
}

/// A handler forwarding the fields of every event to a channel.
pub fn collector() -> (
    impl Fn(&Arc<Bot>, &Event) -> HandlerResult + Send + Sync + 'static,
    mpsc::UnboundedReceiver<Fields>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = move |_: &Arc<Bot>, event: &Event| -> HandlerResult {
        let _ = tx.send(event.fields.clone());
        Ok(Reply::Nothing)
    };
    (handler, rx)
}

/// Receive the next collected event.
pub async fn collected(rx: &mut mpsc::UnboundedReceiver<Fields>) -> Fields {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a handler call")
        .expect("collector dropped")
}

/// Wait until every line dispatched so far has been handled.
pub async fn settle(bot: &Arc<Bot>) {
    let (handler, mut rx) = collector();
    let id = bot
        .attach(slirc_bot::Pattern::new("^SETTLE$"), handler)
        .expect("settle pattern");
    bot.dispatch("SETTLE");
    collected(&mut rx).await;
    bot.detach(id);
}

/// Deterministic file content.
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
