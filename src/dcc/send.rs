//! Offering a file.
//!
//! The file is written from the connection offset one block at a time,
//! optionally throttled to `send_rate` bytes per second. The transfer is
//! complete once the peer acknowledges the file size (mod 2^32).

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::io::SeekFrom;
use std::num::NonZeroU32;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tracing::info;

use super::connection::IdleTimer;
use super::{CloseReason, DccConnection, Transfer, TransferContext};

pub(crate) struct SendSession;

/// Reassembles 4-byte acknowledgements from arbitrary read chunks.
#[derive(Debug, Default)]
pub(crate) struct AckReader {
    partial: Vec<u8>,
}

impl AckReader {
    /// Feed bytes, returning every complete acknowledgement in order.
    pub fn push(&mut self, data: &[u8]) -> Vec<u32> {
        self.partial.extend_from_slice(data);
        let whole = self.partial.len() / 4 * 4;
        let acks = self.partial[..whole]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        self.partial.drain(..whole);
        acks
    }
}

fn limiter(rate: u32, block_size: usize) -> Option<DefaultDirectRateLimiter> {
    let rate = NonZeroU32::new(rate)?;
    let burst = NonZeroU32::new(u32::try_from(block_size).unwrap_or(u32::MAX).max(1))?;
    Some(RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)))
}

async fn write_block(
    writer: &mut OwnedWriteHalf,
    block: &[u8],
    limiter: Option<&DefaultDirectRateLimiter>,
) -> std::io::Result<usize> {
    if let Some(limiter) = limiter {
        let n = NonZeroU32::new(u32::try_from(block.len()).unwrap_or(u32::MAX));
        if let Some(n) = n {
            // Blocks never exceed the burst, so capacity is always sufficient.
            let _ = limiter.until_n_ready(n).await;
        }
    }
    writer.write(block).await
}

#[async_trait]
impl Transfer for SendSession {
    async fn run(
        self: Box<Self>,
        stream: TcpStream,
        conn: &DccConnection,
        ctx: &TransferContext,
    ) -> CloseReason {
        let Some(path) = conn.filepath() else {
            return CloseReason::Error("no source file".into());
        };
        let size = conn.size().unwrap_or(0);
        if size == 0 {
            return CloseReason::Completed;
        }
        let mut offset = conn.offset();
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => return CloseReason::Error(e.to_string()),
        };
        if let Err(e) = file.seek(SeekFrom::Start(offset)).await {
            return CloseReason::Error(e.to_string());
        }

        info!(path = %path.display(), offset, size, "DCC send started");

        let (mut reader, mut writer) = stream.into_split();
        let throttle = limiter(ctx.send_rate, ctx.block_size);
        let mut idle = IdleTimer::new(ctx.idle_timeout);
        let mut acks = AckReader::default();
        let mut inbound = [0u8; 64];
        let mut block = vec![0u8; ctx.block_size];
        let (mut start, mut end) = (0, 0);
        let expected = size as u32;

        loop {
            if start == end && offset < size {
                match file.read(&mut block).await {
                    Ok(0) => return CloseReason::Error("source file shrank".into()),
                    Ok(n) => (start, end) = (0, n),
                    Err(e) => return CloseReason::Error(e.to_string()),
                }
            }
            let sending = start < end;

            tokio::select! {
                _ = conn.cancel_token().cancelled() => return CloseReason::Closed,
                _ = idle.expired() => return CloseReason::IdleTimeout,
                read = reader.read(&mut inbound) => match read {
                    Ok(0) if offset >= size => return CloseReason::Completed,
                    Ok(0) => return CloseReason::PeerClosed,
                    Ok(n) => {
                        idle.reset();
                        if acks.push(&inbound[..n]).contains(&expected) {
                            return CloseReason::Completed;
                        }
                    }
                    Err(e) => return CloseReason::Error(e.to_string()),
                },
                written = write_block(&mut writer, &block[start..end], throttle.as_ref()), if sending => {
                    match written {
                        Ok(0) => return CloseReason::PeerClosed,
                        Ok(n) => {
                            start += n;
                            offset += n as u64;
                            conn.set_position(offset);
                        }
                        Err(e) => return CloseReason::Error(e.to_string()),
                    }
                }
            }
        }
    }
}
