//! The remote side of a DCC connection.
//!
//! Speaks the classic DCC file protocol: the receiver acknowledges with
//! the cumulative byte count as a 32-bit big-endian integer.

use slirc_proto::DccMessage;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// Parse the DCC payload of an outgoing `PRIVMSG nick :\x01DCC ...\x01` line.
pub fn parse_offer(line: &str) -> DccMessage {
    let (_, body) = line.split_once(" :").expect("line has a trailing parameter");
    DccMessage::parse(body).expect("line carries a DCC message")
}

/// A DCC peer driving one TCP stream.
pub struct TestPeer {
    stream: TcpStream,
}

impl TestPeer {
    /// Connect to a port the bot offered.
    pub async fn connect(port: u16) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(("127.0.0.1", port)).await?;
        Ok(Self { stream })
    }

    /// Accept the bot's connection on a listener we offered.
    pub async fn accept(listener: &TcpListener) -> anyhow::Result<Self> {
        let (stream, _) = timeout(Duration::from_secs(5), listener.accept()).await??;
        Ok(Self { stream })
    }

    /// Receive a file, acknowledging as data arrives, until the bot closes.
    ///
    /// `start` is the position the transfer resumes from; acks count from it.
    pub async fn receive(&mut self, start: u64) -> anyhow::Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = match timeout(Duration::from_secs(5), self.stream.read(&mut buf)).await? {
                Ok(0) => return Ok(data),
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => return Ok(data),
                Err(e) => return Err(e.into()),
            };
            data.extend_from_slice(&buf[..n]);
            let ack = (start + data.len() as u64) as u32;
            // The bot may already have closed after the final ack.
            if self.stream.write_all(&ack.to_be_bytes()).await.is_err() {
                return Ok(data);
            }
        }
    }

    /// Send `data`, then wait until the bot has acknowledged `total` bytes.
    pub async fn send(&mut self, data: &[u8], total: u64) -> anyhow::Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        let mut ack = [0u8; 4];
        loop {
            timeout(Duration::from_secs(5), self.stream.read_exact(&mut ack)).await??;
            if u64::from(u32::from_be_bytes(ack)) == total {
                return Ok(());
            }
        }
    }

    /// Write one chat line.
    pub async fn send_line(&mut self, line: &str) -> anyhow::Result<()> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await?;
        Ok(())
    }

    /// Read one chat line, without the terminator. `None` on EOF.
    pub async fn recv_line(&mut self) -> anyhow::Result<Option<String>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = timeout(Duration::from_secs(5), self.stream.read(&mut byte)).await??;
            if n == 0 {
                return Ok((!line.is_empty()).then(|| String::from_utf8_lossy(&line).into_owned()));
            }
            match byte[0] {
                b'\n' => {
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
                }
                b => line.push(b),
            }
        }
    }

    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}
