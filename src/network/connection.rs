//! Server connection lifecycle.

use futures_util::{SinkExt, StreamExt};
use slirc_proto::LineCodec;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{Instrument, debug, info, warn};

use super::{NetworkError, tls};
use crate::bot::{Bot, WireReceiver};
use crate::handlers::Direction;
use crate::telemetry::spans;

/// Connect to the configured server and run until the link closes.
pub async fn run(bot: Arc<Bot>, wire: &mut WireReceiver) -> Result<(), NetworkError> {
    let server = bot.config().server.clone();
    let span = spans::connection(&server.host, server.port, &server.nick);

    async move {
        let stream = TcpStream::connect((server.host.as_str(), server.port)).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "set_nodelay failed");
        }
        info!(tls = server.tls, "Connected");

        if server.tls {
            let stream = tls::connect(stream, &server.host, server.verify_tls).await?;
            drive(bot, wire, stream).await
        } else {
            drive(bot, wire, stream).await
        }
    }
    .instrument(span)
    .await
}

const QUIT_LINE: &str = "QUIT :Shutting down";

fn register(bot: &Bot) {
    let server = &bot.config().server;
    let mut lines = Vec::with_capacity(3);
    if let Some(password) = &server.password {
        lines.push(format!("PASS {password}"));
    }
    lines.push(format!("NICK {}", bot.nick()));
    lines.push(format!("USER {} 0 * :{}", server.username(), server.realname()));

    for line in lines {
        if let Err(e) = bot.outbox().send_line(line) {
            warn!(error = %e, "Registration line not queued");
        }
    }
}

/// Run the line loops over an established stream.
///
/// Sends registration first, then feeds every received line to the
/// dispatcher and writes every line from `wire`. Returns when the server
/// closes the link or the bot shuts down.
pub async fn drive<S>(bot: Arc<Bot>, wire: &mut WireReceiver, stream: S) -> Result<(), NetworkError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let encoding = &bot.config().server.encoding;
    let (reader, writer) = tokio::io::split(stream);
    let mut reader = FramedRead::new(reader, LineCodec::new(encoding)?);
    let mut writer = FramedWrite::new(writer, LineCodec::new(encoding)?);

    register(&bot);

    loop {
        tokio::select! {
            _ = bot.shutdown_token().cancelled() => {
                while let Ok(line) = wire.try_recv() {
                    writer.send(line).await?;
                }
                writer.send(QUIT_LINE).await?;
                info!("Shutting down connection");
                return Ok(());
            }
            line = reader.next() => match line {
                Some(Ok(line)) => {
                    debug!(line = %line, "<-");
                    bot.dispatcher().dispatch(&line, Direction::In);
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    info!("Server closed connection");
                    return Ok(());
                }
            },
            Some(line) = wire.recv() => {
                debug!(line = %line, "->");
                writer.send(line).await?;
            }
        }
    }
}
