//! A single DCC connection and its lifecycle.

use parking_lot::Mutex;
use slirc_proto::{IrcString, ctcp};
use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;

use super::DccKind;
use crate::error::DccError;

/// Why a connection ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The transfer finished.
    Completed,
    /// The peer hung up first.
    PeerClosed,
    /// Closed locally.
    Closed,
    /// Nothing received for the idle timeout.
    IdleTimeout,
    /// No socket within the accept timeout.
    AcceptTimeout,
    Error(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::PeerClosed => f.write_str("peer closed"),
            Self::Closed => f.write_str("closed"),
            Self::IdleTimeout => f.write_str("idle timeout"),
            Self::AcceptTimeout => f.write_str("accept timeout"),
            Self::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Lifecycle state. `Closed` is terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DccState {
    /// Admitted, socket not set up yet.
    Requested,
    /// Waiting for the peer to connect.
    Listening,
    /// Connecting out to the peer.
    Connecting,
    /// Socket established.
    Ready,
    /// Transfer loop running.
    Started,
    Closed(CloseReason),
}

pub(crate) struct FileInfo {
    pub path: PathBuf,
    pub name: String,
    pub size: Option<u64>,
}

struct Inner {
    id: u64,
    kind: DccKind,
    peer: IrcString,
    port: u16,
    file: Option<FileInfo>,
    offset: AtomicU64,
    position: AtomicU64,
    ready: AtomicBool,
    started: AtomicBool,
    state: watch::Sender<DccState>,
    cancel: CancellationToken,
    chat_tx: mpsc::UnboundedSender<String>,
    chat_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

/// Handle to one DCC connection. Cheap to clone.
#[derive(Clone)]
pub struct DccConnection {
    inner: Arc<Inner>,
}

impl DccConnection {
    pub(crate) fn new(
        id: u64,
        kind: DccKind,
        peer: IrcString,
        port: u16,
        file: Option<FileInfo>,
        offset: u64,
    ) -> Self {
        let (state, _) = watch::channel(DccState::Requested);
        let (chat_tx, chat_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                id,
                kind,
                peer,
                port,
                file,
                offset: AtomicU64::new(offset),
                position: AtomicU64::new(offset),
                ready: AtomicBool::new(false),
                started: AtomicBool::new(false),
                state,
                cancel: CancellationToken::new(),
                chat_tx,
                chat_rx: Mutex::new(Some(chat_rx)),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn kind(&self) -> DccKind {
        self.inner.kind
    }

    /// The peer as given at creation (nick or full mask).
    pub fn peer(&self) -> &IrcString {
        &self.inner.peer
    }

    pub fn peer_nick(&self) -> &str {
        self.inner.peer.nick().unwrap_or(self.inner.peer.as_str())
    }

    /// Local listening port, or the peer's port when connecting out.
    pub fn port(&self) -> u16 {
        self.inner.port
    }

    pub fn filepath(&self) -> Option<&Path> {
        self.inner.file.as_ref().map(|f| f.path.as_path())
    }

    pub fn filename(&self) -> Option<&str> {
        self.inner.file.as_ref().map(|f| f.name.as_str())
    }

    pub fn size(&self) -> Option<u64> {
        self.inner.file.as_ref().and_then(|f| f.size)
    }

    /// Byte offset the transfer starts from.
    pub fn offset(&self) -> u64 {
        self.inner.offset.load(Ordering::Acquire)
    }

    pub(crate) fn set_offset(&self, offset: u64) {
        self.inner.offset.store(offset, Ordering::Release);
        self.inner.position.store(offset, Ordering::Release);
    }

    /// Bytes of the file accounted for so far, offset included.
    pub fn position(&self) -> u64 {
        self.inner.position.load(Ordering::Acquire)
    }

    pub(crate) fn set_position(&self, position: u64) {
        self.inner.position.store(position, Ordering::Release);
    }

    pub fn state(&self) -> DccState {
        self.inner.state.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.inner.state.borrow(), DccState::Closed(_))
    }

    /// Move to `state` unless already closed.
    pub(crate) fn set_state(&self, state: DccState) -> bool {
        match state {
            DccState::Ready => self.inner.ready.store(true, Ordering::Release),
            DccState::Started => self.inner.started.store(true, Ordering::Release),
            _ => {}
        }
        self.inner.state.send_if_modified(|current| {
            if matches!(current, DccState::Closed(_)) {
                return false;
            }
            *current = state;
            true
        })
    }

    /// Resolves with this connection once the socket is up.
    ///
    /// Fails with [`DccError::Closed`] if the connection closes first.
    pub async fn wait_ready(&self) -> Result<DccConnection, DccError> {
        let mut rx = self.inner.state.subscribe();
        let _ = rx
            .wait_for(|s| matches!(s, DccState::Ready | DccState::Started | DccState::Closed(_)))
            .await;
        if self.inner.ready.load(Ordering::Acquire) {
            Ok(self.clone())
        } else {
            Err(DccError::Closed)
        }
    }

    /// Resolves once the transfer loop has started.
    pub async fn wait_started(&self) -> Result<(), DccError> {
        let mut rx = self.inner.state.subscribe();
        let _ = rx
            .wait_for(|s| matches!(s, DccState::Started | DccState::Closed(_)))
            .await;
        if self.inner.started.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DccError::Closed)
        }
    }

    /// Resolves with the close reason once the connection has closed.
    pub async fn wait_closed(&self) -> CloseReason {
        let mut rx = self.inner.state.subscribe();
        match rx.wait_for(|s| matches!(s, DccState::Closed(_))).await {
            Ok(state) => match &*state {
                DccState::Closed(reason) => reason.clone(),
                _ => CloseReason::Closed,
            },
            Err(_) => CloseReason::Closed,
        }
    }

    /// Ask the connection to close.
    pub fn close(&self) {
        self.inner.cancel.cancel();
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Queue a line on a chat connection.
    pub fn send_line(&self, line: impl Into<String>) -> Result<(), DccError> {
        if self.inner.kind != DccKind::Chat || self.is_closed() {
            return Err(DccError::Closed);
        }
        self.inner.chat_tx.send(line.into()).map_err(|_| DccError::Closed)
    }

    /// Queue a CTCP ACTION on a chat connection.
    pub fn action(&self, text: &str) -> Result<(), DccError> {
        self.send_line(ctcp::action(text))
    }

    pub(crate) fn take_chat_receiver(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.inner.chat_rx.lock().take()
    }
}

impl PartialEq for DccConnection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for DccConnection {}

impl fmt::Debug for DccConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DccConnection")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("peer", &self.inner.peer)
            .field("port", &self.inner.port)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

/// Resettable inactivity deadline. `None` never fires.
pub(crate) struct IdleTimer {
    period: Option<Duration>,
    sleep: Pin<Box<Sleep>>,
}

impl IdleTimer {
    pub fn new(period: Option<Duration>) -> Self {
        let sleep = tokio::time::sleep(period.unwrap_or(Duration::ZERO));
        Self {
            period,
            sleep: Box::pin(sleep),
        }
    }

    pub fn reset(&mut self) {
        if let Some(period) = self.period {
            self.sleep.as_mut().reset(Instant::now() + period);
        }
    }

    pub async fn expired(&mut self) {
        match self.period {
            Some(_) => self.sleep.as_mut().await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat() -> DccConnection {
        DccConnection::new(1, DccKind::Chat, IrcString::from("bob!b@host"), 4000, None, 0)
    }

    #[test]
    fn closed_is_terminal() {
        let conn = chat();
        assert!(conn.set_state(DccState::Listening));
        assert!(conn.set_state(DccState::Closed(CloseReason::Closed)));
        assert!(!conn.set_state(DccState::Ready));
        assert_eq!(conn.state(), DccState::Closed(CloseReason::Closed));
    }

    #[test]
    fn peer_nick_from_mask() {
        assert_eq!(chat().peer_nick(), "bob");
    }

    #[tokio::test]
    async fn wait_ready_fails_when_closed_first() {
        let conn = chat();
        conn.set_state(DccState::Closed(CloseReason::AcceptTimeout));
        assert!(matches!(conn.wait_ready().await, Err(DccError::Closed)));
        assert_eq!(conn.wait_closed().await, CloseReason::AcceptTimeout);
    }

    #[tokio::test]
    async fn wait_ready_resolves_with_connection() {
        let conn = chat();
        let waiter = tokio::spawn({
            let conn = conn.clone();
            async move { conn.wait_ready().await }
        });
        conn.set_state(DccState::Ready);
        let ready = waiter.await.unwrap().unwrap();
        assert_eq!(ready, conn);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timer_reset_extends_deadline() {
        let mut idle = IdleTimer::new(Some(Duration::from_secs(10)));
        tokio::time::advance(Duration::from_secs(8)).await;
        idle.reset();
        let start = Instant::now();
        idle.expired().await;
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[test]
    fn send_line_only_on_open_chat() {
        let conn = chat();
        assert!(conn.send_line("hi").is_ok());
        conn.set_state(DccState::Closed(CloseReason::Closed));
        assert!(conn.send_line("hi").is_err());
    }
}
