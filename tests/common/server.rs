//! Scripted IRC server.
//!
//! Listens on a loopback port and hands out the accepted link so tests can
//! read what the bot registers with and feed it server lines.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// A listening fake server.
pub struct TestServer {
    listener: TcpListener,
}

impl TestServer {
    /// Bind to an ephemeral loopback port.
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    /// Port the bot should connect to.
    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .expect("listener has an address")
            .port()
    }

    /// Accept the bot's connection.
    pub async fn accept(&self) -> anyhow::Result<ServerLink> {
        let (stream, _) = timeout(Duration::from_secs(5), self.listener.accept()).await??;
        Ok(ServerLink::new(stream))
    }
}

/// The server side of one accepted link.
pub struct ServerLink {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl ServerLink {
    fn new(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer: BufWriter::new(write),
        }
    }

    /// Send a raw line to the bot.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next line from the bot, without the terminator. `None` on EOF.
    pub async fn recv(&mut self) -> anyhow::Result<Option<String>> {
        let mut line = String::new();
        let n = timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Read lines until one starts with `prefix`.
    pub async fn expect(&mut self, prefix: &str) -> anyhow::Result<String> {
        loop {
            match self.recv().await? {
                Some(line) if line.starts_with(prefix) => return Ok(line),
                Some(_) => continue,
                None => anyhow::bail!("link closed before {prefix:?}"),
            }
        }
    }
}
