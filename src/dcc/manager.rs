//! DCC connection manager.
//!
//! Connections are indexed by type, peer nick and port from the moment they
//! are admitted until they close, so pending offers count toward limits.

use parking_lot::Mutex;
use slirc_proto::dcc::safe_filename;
use slirc_proto::{DccMessage, IrcString};
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{Instrument, debug, info, warn};

use super::connection::FileInfo;
use super::{
    Admission, CloseReason, DccConnection, DccKind, DccState, TransferContext, transfer_for,
};
use crate::bot::Outbox;
use crate::config::DccConfig;
use crate::error::DccError;
use crate::handlers::Dispatcher;
use crate::telemetry::spans;

/// Parameters for [`DccManager::create`].
#[derive(Clone, Debug, Default)]
pub struct DccParams {
    /// Peer address to connect to.
    pub host: Option<IpAddr>,
    /// Peer port to connect to. Without it the manager listens and offers.
    pub port: Option<u16>,
    /// Local file to send, or to write received bytes to.
    pub filepath: Option<PathBuf>,
    /// Announced file name; defaults to the sanitized base name of the path.
    pub filename: Option<String>,
    /// Expected size of a received file.
    pub size: Option<u64>,
    /// Starting offset; for gets, defaults to the length of an existing file.
    pub offset: Option<u64>,
}

impl DccParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(mut self, host: IpAddr, port: u16) -> Self {
        self.host = Some(host);
        self.port = Some(port);
        self
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.filepath = Some(path.into());
        self
    }

    pub fn filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

fn peer_key(peer: &IrcString) -> String {
    peer.nick().unwrap_or(peer.as_str()).to_ascii_lowercase()
}

fn non_zero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}

#[derive(Default)]
struct Index {
    kinds: HashMap<DccKind, HashMap<String, HashMap<u16, DccConnection>>>,
}

impl Index {
    fn total(&self, kind: DccKind) -> usize {
        self.kinds
            .get(&kind)
            .map_or(0, |peers| peers.values().map(HashMap::len).sum())
    }

    fn for_peer(&self, kind: DccKind, key: &str) -> usize {
        self.kinds
            .get(&kind)
            .and_then(|peers| peers.get(key))
            .map_or(0, HashMap::len)
    }

    fn get(&self, kind: DccKind, key: &str, port: u16) -> Option<DccConnection> {
        self.kinds.get(&kind)?.get(key)?.get(&port).cloned()
    }

    fn insert(&mut self, conn: &DccConnection) {
        self.kinds
            .entry(conn.kind())
            .or_default()
            .entry(peer_key(conn.peer()))
            .or_default()
            .insert(conn.port(), conn.clone());
    }

    fn remove(&mut self, conn: &DccConnection) {
        let key = peer_key(conn.peer());
        let Some(peers) = self.kinds.get_mut(&conn.kind()) else {
            return;
        };
        if let Some(ports) = peers.get_mut(&key) {
            if ports.get(&conn.port()) == Some(conn) {
                ports.remove(&conn.port());
            }
            if ports.is_empty() {
                peers.remove(&key);
            }
        }
    }

    fn all(&self) -> Vec<DccConnection> {
        self.kinds
            .values()
            .flat_map(|peers| peers.values())
            .flat_map(|ports| ports.values().cloned())
            .collect()
    }
}

enum Establish {
    Connect(SocketAddr),
    Listen(TcpListener),
}

impl Establish {
    async fn run(self) -> io::Result<TcpStream> {
        match self {
            Self::Connect(addr) => TcpStream::connect(addr).await,
            Self::Listen(listener) => listener.accept().await.map(|(stream, _)| stream),
        }
    }
}

struct Shared {
    config: DccConfig,
    encoding: String,
    dispatcher: Dispatcher,
    outbox: Outbox,
    index: Mutex<Index>,
    next_id: AtomicU64,
}

impl Shared {
    fn admission(&self, kind: DccKind, key: &str) -> Admission {
        let index = self.index.lock();
        Admission::check(
            kind,
            self.config.for_kind(kind),
            index.total(kind),
            index.for_peer(kind, key),
        )
    }

    fn reject(&self, peer: &IrcString, admission: &Admission) -> DccError {
        let nick = peer.nick().unwrap_or(peer.as_str());
        let reason = admission.to_string();
        info!(peer = %nick, reason = %reason, "DCC connection refused");
        if let Err(e) = self.outbox.notice(nick, &reason) {
            debug!(error = %e, "Refusal notice not sent");
        }
        DccError::Rejected(reason)
    }

    fn close(&self, conn: &DccConnection, reason: CloseReason) {
        // Unindex before publishing so a woken `wait_closed()` sees the freed slot.
        self.index.lock().remove(conn);
        let first = conn.set_state(DccState::Closed(reason.clone()));
        if first {
            info!(
                reason = %reason,
                position = conn.position(),
                "DCC connection closed"
            );
        }
    }
}

/// Creates, indexes and tracks DCC connections.
#[derive(Clone)]
pub struct DccManager {
    shared: Arc<Shared>,
}

impl DccManager {
    pub fn new(config: DccConfig, encoding: String, dispatcher: Dispatcher, outbox: Outbox) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                encoding,
                dispatcher,
                outbox,
                index: Mutex::new(Index::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &DccConfig {
        &self.shared.config
    }

    /// Whether a new `kind` connection with `peer` would be admitted.
    pub fn is_allowed(&self, kind: DccKind, peer: &IrcString) -> Admission {
        self.shared.admission(kind, &peer_key(peer))
    }

    /// Admit and start a connection.
    ///
    /// With a peer port the manager connects out; otherwise it listens on an
    /// ephemeral port and sends the peer a CTCP offer.
    pub async fn create(
        &self,
        kind: DccKind,
        peer: impl Into<IrcString>,
        params: DccParams,
    ) -> Result<DccConnection, DccError> {
        let peer = peer.into();
        let key = peer_key(&peer);
        let shared = &self.shared;

        let admission = shared.admission(kind, &key);
        if !admission.is_allowed() {
            return Err(shared.reject(&peer, &admission));
        }

        let (establish, port) = match (params.host, params.port) {
            (Some(host), Some(port)) => (Establish::Connect(SocketAddr::new(host, port)), port),
            (None, Some(_)) => return Err(DccError::MissingAddress(kind)),
            (_, None) if kind == DccKind::Get => return Err(DccError::MissingPort(kind)),
            (_, None) => {
                let listener = TcpListener::bind((shared.config.bind, 0)).await?;
                let port = listener.local_addr()?.port();
                (Establish::Listen(listener), port)
            }
        };

        let (file, offset) = self.file_info(kind, &params).await?;

        let conn = {
            let mut index = shared.index.lock();
            let admission = Admission::check(
                kind,
                shared.config.for_kind(kind),
                index.total(kind),
                index.for_peer(kind, &key),
            );
            if !admission.is_allowed() {
                drop(index);
                return Err(shared.reject(&peer, &admission));
            }
            let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
            let conn = DccConnection::new(id, kind, peer, port, file, offset);
            index.insert(&conn);
            conn
        };

        match &establish {
            Establish::Connect(_) => {
                conn.set_state(DccState::Connecting);
            }
            Establish::Listen(_) => {
                conn.set_state(DccState::Listening);
                self.offer(&conn);
            }
        }

        let span = spans::dcc(kind, conn.peer_nick(), port);
        tokio::spawn(run(Arc::clone(shared), conn.clone(), establish).instrument(span));
        Ok(conn)
    }

    async fn file_info(
        &self,
        kind: DccKind,
        params: &DccParams,
    ) -> Result<(Option<FileInfo>, u64), DccError> {
        match kind {
            DccKind::Chat => Ok((None, 0)),
            DccKind::Send => {
                let path = params.filepath.clone().ok_or(DccError::MissingFile(kind))?;
                let size = tokio::fs::metadata(&path).await?.len();
                let name = params.filename.clone().unwrap_or_else(|| display_name(&path));
                let offset = params.offset.unwrap_or(0).min(size);
                Ok((
                    Some(FileInfo {
                        path,
                        name: safe_filename(&name),
                        size: Some(size),
                    }),
                    offset,
                ))
            }
            DccKind::Get => {
                let path = match (&params.filepath, &params.filename) {
                    (Some(path), _) => path.clone(),
                    (None, Some(name)) => self.shared.config.download_dir.join(safe_filename(name)),
                    (None, None) => return Err(DccError::MissingFile(kind)),
                };
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let offset = match params.offset {
                    Some(offset) => offset,
                    None => match tokio::fs::metadata(&path).await {
                        Ok(meta) => meta.len(),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
                        Err(e) => return Err(e.into()),
                    },
                };
                let name = params.filename.clone().unwrap_or_else(|| display_name(&path));
                Ok((
                    Some(FileInfo {
                        path,
                        name,
                        size: params.size,
                    }),
                    offset,
                ))
            }
        }
    }

    fn offer(&self, conn: &DccConnection) {
        let addr = self.shared.config.ip;
        let port = conn.port();
        let message = match conn.kind() {
            DccKind::Chat => DccMessage::Chat { addr, port },
            DccKind::Send => DccMessage::Send {
                filename: conn.filename().unwrap_or_default().to_string(),
                addr,
                port,
                size: conn.size(),
            },
            DccKind::Get => return,
        };
        if let Err(e) = self.shared.outbox.ctcp(conn.peer_nick(), &message.to_string()) {
            warn!(error = %e, "DCC offer not sent");
        }
    }

    /// Restart a pending send at `position`, answering with DCC ACCEPT.
    pub fn resume(
        &self,
        peer: &IrcString,
        filename: &str,
        port: u16,
        position: u64,
    ) -> Result<DccConnection, DccError> {
        let key = peer_key(peer);
        let conn = self
            .shared
            .index
            .lock()
            .get(DccKind::Send, &key, port)
            .ok_or_else(|| DccError::NotFound {
                kind: DccKind::Send,
                peer: key.clone(),
                port,
            })?;
        if conn.filename() != Some(safe_filename(filename).as_str()) {
            debug!(
                requested = %filename,
                offered = conn.filename().unwrap_or_default(),
                "Resume file name differs from offer"
            );
            return Err(DccError::NotFound {
                kind: DccKind::Send,
                peer: key,
                port,
            });
        }

        let position = conn.size().map_or(position, |size| position.min(size));
        conn.set_offset(position);
        info!(peer = %key, port, position, "DCC send resumed");

        let accept = DccMessage::Accept {
            filename: filename.to_string(),
            port,
            position,
        };
        if let Err(e) = self.shared.outbox.ctcp(conn.peer_nick(), &accept.to_string()) {
            warn!(error = %e, "DCC accept not sent");
        }
        Ok(conn)
    }

    pub fn get(&self, kind: DccKind, peer: &IrcString, port: u16) -> Option<DccConnection> {
        self.shared.index.lock().get(kind, &peer_key(peer), port)
    }

    /// Open connections of `kind`, pending ones included.
    pub fn active(&self, kind: DccKind) -> usize {
        self.shared.index.lock().total(kind)
    }

    pub fn count_for(&self, kind: DccKind, peer: &IrcString) -> usize {
        self.shared.index.lock().for_peer(kind, &peer_key(peer))
    }

    pub fn connections(&self, kind: DccKind) -> Vec<DccConnection> {
        let mut conns: Vec<_> = self
            .shared
            .index
            .lock()
            .all()
            .into_iter()
            .filter(|c| c.kind() == kind)
            .collect();
        conns.sort_by_key(DccConnection::id);
        conns
    }

    pub fn close_all(&self) {
        let all = self.shared.index.lock().all();
        for conn in all {
            conn.close();
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn establish_within(
    establish: Establish,
    limit: Option<Duration>,
) -> Result<TcpStream, CloseReason> {
    let result = match limit {
        Some(limit) => match tokio::time::timeout(limit, establish.run()).await {
            Ok(result) => result,
            Err(_) => return Err(CloseReason::AcceptTimeout),
        },
        None => establish.run().await,
    };
    result.map_err(|e| CloseReason::Error(e.to_string()))
}

async fn run(shared: Arc<Shared>, conn: DccConnection, establish: Establish) {
    let limits = shared.config.for_kind(conn.kind());
    let accept_timeout = non_zero(limits.accept_timeout());
    let ctx = TransferContext {
        dispatcher: shared.dispatcher.clone(),
        encoding: shared.encoding.clone(),
        idle_timeout: non_zero(limits.idle_timeout()),
        block_size: shared.config.block_size.max(1),
        send_rate: shared.config.send_rate,
    };

    let established = tokio::select! {
        _ = conn.cancel_token().cancelled() => Err(CloseReason::Closed),
        result = establish_within(establish, accept_timeout) => result,
    };

    let reason = match established {
        Ok(stream) => {
            if let Err(e) = stream.set_nodelay(true) {
                debug!(error = %e, "set_nodelay failed");
            }
            conn.set_state(DccState::Ready);
            info!(offset = conn.offset(), "DCC connection established");
            conn.set_state(DccState::Started);
            transfer_for(conn.kind()).run(stream, &conn, &ctx).await
        }
        Err(reason) => reason,
    };

    shared.close(&conn, reason);
}
