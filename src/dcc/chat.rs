//! Line-oriented DCC chat.

use async_trait::async_trait;
use futures_util::SinkExt;
use slirc_proto::{LineCodec, LineFramer};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info};

use super::connection::IdleTimer;
use super::{CloseReason, DccConnection, Transfer, TransferContext};
use crate::handlers::Direction;

const IDLE_NOTICE: &str = "Idle timeout. Closing connection.";

pub(crate) struct ChatSession;

#[async_trait]
impl Transfer for ChatSession {
    async fn run(
        self: Box<Self>,
        stream: TcpStream,
        conn: &DccConnection,
        ctx: &TransferContext,
    ) -> CloseReason {
        let (mut reader, writer) = stream.into_split();
        let (mut framer, codec) = match (
            LineFramer::new(&ctx.encoding),
            LineCodec::new(&ctx.encoding),
        ) {
            (Ok(framer), Ok(codec)) => (framer, codec),
            (Err(e), _) | (_, Err(e)) => return CloseReason::Error(e.to_string()),
        };
        let mut writer = FramedWrite::new(writer, codec);
        let Some(mut outgoing) = conn.take_chat_receiver() else {
            return CloseReason::Error("chat already running".into());
        };
        let mut idle = IdleTimer::new(ctx.idle_timeout);
        let mut buf = vec![0u8; 4096];

        info!("DCC chat started");
        loop {
            tokio::select! {
                _ = conn.cancel_token().cancelled() => return CloseReason::Closed,
                _ = idle.expired() => {
                    if let Err(e) = writer.send(IDLE_NOTICE).await {
                        debug!(error = %e, "Idle notice not sent");
                    }
                    return CloseReason::IdleTimeout;
                }
                read = reader.read(&mut buf) => match read {
                    Ok(0) => return CloseReason::PeerClosed,
                    Ok(n) => {
                        idle.reset();
                        for line in framer.feed(&buf[..n]) {
                            ctx.dispatcher.dispatch_dcc(&line, Direction::DccIn, conn);
                        }
                    }
                    Err(e) => return CloseReason::Error(e.to_string()),
                },
                Some(line) = outgoing.recv() => {
                    ctx.dispatcher.dispatch_dcc(&line, Direction::DccOut, conn);
                    if let Err(e) = writer.send(line.as_str()).await {
                        return CloseReason::Error(e.to_string());
                    }
                }
            }
        }
    }
}
