//! Receiving a file.
//!
//! Bytes are appended at the connection offset and each chunk is answered
//! with the cumulative position as a 4-byte big-endian acknowledgement.

use async_trait::async_trait;
use std::io::SeekFrom;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::connection::IdleTimer;
use super::{CloseReason, DccConnection, Transfer, TransferContext};

pub(crate) struct GetSession;

/// Acknowledgement for `position`, truncated to 32 bits.
pub(crate) fn ack(position: u64) -> [u8; 4] {
    (position as u32).to_be_bytes()
}

#[async_trait]
impl Transfer for GetSession {
    async fn run(
        self: Box<Self>,
        stream: TcpStream,
        conn: &DccConnection,
        ctx: &TransferContext,
    ) -> CloseReason {
        let Some(path) = conn.filepath() else {
            return CloseReason::Error("no destination file".into());
        };
        let offset = conn.offset();
        let mut file = match open(path, offset).await {
            Ok(file) => file,
            Err(e) => return CloseReason::Error(e.to_string()),
        };

        info!(path = %path.display(), offset, size = ?conn.size(), "DCC get started");
        let reason = receive(&mut file, stream, conn, ctx).await;

        match (file.flush().await, reason) {
            (Err(e), CloseReason::Completed) => CloseReason::Error(e.to_string()),
            (Err(e), reason) => {
                debug!(error = %e, "Flush after failed transfer");
                reason
            }
            (Ok(()), reason) => reason,
        }
    }
}

async fn open(path: &std::path::Path, offset: u64) -> std::io::Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .await?;
    file.set_len(offset).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    Ok(file)
}

async fn receive(
    file: &mut File,
    stream: TcpStream,
    conn: &DccConnection,
    ctx: &TransferContext,
) -> CloseReason {
    let size = conn.size();
    let mut received = conn.offset();
    if size.is_some_and(|s| received >= s) {
        return CloseReason::Completed;
    }

    let (mut reader, mut writer) = stream.into_split();
    let mut idle = IdleTimer::new(ctx.idle_timeout);
    let mut buf = vec![0u8; ctx.block_size];

    loop {
        tokio::select! {
            _ = conn.cancel_token().cancelled() => return CloseReason::Closed,
            _ = idle.expired() => return CloseReason::IdleTimeout,
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    return match size {
                        Some(s) if received < s => CloseReason::PeerClosed,
                        _ => CloseReason::Completed,
                    };
                }
                Ok(n) => {
                    idle.reset();
                    if let Err(e) = file.write_all(&buf[..n]).await {
                        return CloseReason::Error(e.to_string());
                    }
                    received += n as u64;
                    conn.set_position(received);
                    if let Err(e) = writer.write_all(&ack(received)).await {
                        return CloseReason::Error(e.to_string());
                    }
                    if size.is_some_and(|s| received >= s) {
                        return CloseReason::Completed;
                    }
                }
                Err(e) => return CloseReason::Error(e.to_string()),
            },
        }
    }
}
