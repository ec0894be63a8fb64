//! DCC control messages carried over CTCP.
//!
//! ```text
//! DCC CHAT chat <ip> <port>
//! DCC SEND <filename> <ip> <port> [<size>]
//! DCC RESUME <filename> <port> <position>
//! DCC ACCEPT <filename> <port> <position>
//! ```
//!
//! IPv4 addresses travel as a single unsigned 32-bit decimal integer, the
//! long-standing DCC convention; IPv6 addresses travel as literals.
//!
//! # Example
//!
//! ```
//! use slirc_proto::dcc::DccMessage;
//! use std::net::Ipv4Addr;
//!
//! let offer = DccMessage::Chat { addr: Ipv4Addr::LOCALHOST.into(), port: 4567 };
//! assert_eq!(offer.to_string(), "DCC CHAT chat 2130706433 4567");
//! assert_eq!(DccMessage::parse(&offer.to_string()).unwrap(), offer);
//! ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::ctcp;
use crate::error::{DccParseError, ProtocolError};

/// A parsed DCC control message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DccMessage {
    /// Offer of a chat connection.
    Chat {
        /// Address the offering side listens on.
        addr: IpAddr,
        /// Listening port.
        port: u16,
    },
    /// Offer of a file.
    Send {
        /// File name as announced.
        filename: String,
        /// Address the offering side listens on.
        addr: IpAddr,
        /// Listening port.
        port: u16,
        /// Declared file size.
        size: Option<u64>,
    },
    /// Receiver asks to restart a transfer at `position`.
    Resume {
        /// File name from the original offer.
        filename: String,
        /// Port from the original offer.
        port: u16,
        /// Byte offset to restart at.
        position: u64,
    },
    /// Sender agrees to restart a transfer at `position`.
    Accept {
        /// File name from the original offer.
        filename: String,
        /// Port from the original offer.
        port: u16,
        /// Byte offset the sender will start from.
        position: u64,
    },
}

impl DccMessage {
    /// Parse a CTCP payload, with or without the `\x01` delimiters.
    pub fn parse(payload: &str) -> Result<Self, ProtocolError> {
        let text = ctcp::unquote(payload).unwrap_or(payload);
        Self::parse_inner(text).map_err(|cause| ProtocolError::InvalidDcc {
            string: text.to_owned(),
            cause,
        })
    }

    fn parse_inner(text: &str) -> Result<Self, DccParseError> {
        let (command, rest) = ctcp::split_command(text);
        if !command.eq_ignore_ascii_case("DCC") {
            return Err(DccParseError::NotDcc);
        }
        let rest = rest.ok_or(DccParseError::MissingArgument("type"))?;
        let (kind, args) = ctcp::split_command(rest);
        let args = args.unwrap_or("");

        match kind.to_ascii_uppercase().as_str() {
            "CHAT" => {
                let mut it = args.split_whitespace();
                let _protocol = it.next().ok_or(DccParseError::MissingArgument("protocol"))?;
                let addr = decode_address(it.next().ok_or(DccParseError::MissingArgument("ip"))?)?;
                let port = number("port", it.next())?;
                Ok(Self::Chat { addr, port })
            }
            "SEND" => {
                let (filename, args) = take_filename(args)?;
                let mut it = args.split_whitespace();
                let addr = decode_address(it.next().ok_or(DccParseError::MissingArgument("ip"))?)?;
                let port = number("port", it.next())?;
                let size = it.next().map(|v| number("size", Some(v))).transpose()?;
                Ok(Self::Send {
                    filename,
                    addr,
                    port,
                    size,
                })
            }
            "RESUME" | "ACCEPT" => {
                let (filename, args) = take_filename(args)?;
                let mut it = args.split_whitespace();
                let port = number("port", it.next())?;
                let position = number("position", it.next())?;
                if kind.eq_ignore_ascii_case("RESUME") {
                    Ok(Self::Resume {
                        filename,
                        port,
                        position,
                    })
                } else {
                    Ok(Self::Accept {
                        filename,
                        port,
                        position,
                    })
                }
            }
            _ => Err(DccParseError::Unsupported(kind.to_owned())),
        }
    }

    /// Wrap the message in CTCP delimiters, ready for a PRIVMSG body.
    pub fn to_ctcp(&self) -> String {
        ctcp::quote(&self.to_string())
    }
}

impl fmt::Display for DccMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat { addr, port } => {
                write!(f, "DCC CHAT chat {} {}", encode_address(*addr), port)
            }
            Self::Send {
                filename,
                addr,
                port,
                size,
            } => {
                write!(
                    f,
                    "DCC SEND {} {} {}",
                    quote_filename(filename),
                    encode_address(*addr),
                    port
                )?;
                if let Some(size) = size {
                    write!(f, " {size}")?;
                }
                Ok(())
            }
            Self::Resume {
                filename,
                port,
                position,
            } => write!(f, "DCC RESUME {} {port} {position}", quote_filename(filename)),
            Self::Accept {
                filename,
                port,
                position,
            } => write!(f, "DCC ACCEPT {} {port} {position}", quote_filename(filename)),
        }
    }
}

/// Encode an address for a DCC offer.
pub fn encode_address(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => u32::from(v4).to_string(),
        IpAddr::V6(v6) => v6.to_string(),
    }
}

/// Decode an address from a DCC offer.
///
/// Accepts the 32-bit integer form as well as dotted or IPv6 literals.
pub fn decode_address(raw: &str) -> Result<IpAddr, DccParseError> {
    if let Ok(n) = raw.parse::<u32>() {
        return Ok(IpAddr::V4(Ipv4Addr::from(n)));
    }
    raw.parse::<IpAddr>()
        .map_err(|_| DccParseError::InvalidAddress(raw.to_owned()))
}

/// Make a file name safe to announce: no directories, no spaces, no quotes.
pub fn safe_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .filter(|c| *c != '"')
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

fn quote_filename(name: &str) -> String {
    if name.contains(' ') {
        format!("\"{name}\"")
    } else {
        name.to_owned()
    }
}

fn take_filename(args: &str) -> Result<(String, &str), DccParseError> {
    let args = args.trim_start();
    if let Some(quoted) = args.strip_prefix('"') {
        let end = quoted
            .find('"')
            .ok_or(DccParseError::MissingArgument("filename"))?;
        return Ok((quoted[..end].to_owned(), &quoted[end + 1..]));
    }
    match args.split_once(' ') {
        Some((name, rest)) if !name.is_empty() => Ok((name.to_owned(), rest)),
        _ => Err(DccParseError::MissingArgument("filename")),
    }
}

fn number<T: std::str::FromStr>(field: &'static str, raw: Option<&str>) -> Result<T, DccParseError> {
    let raw = raw.ok_or(DccParseError::MissingArgument(field))?;
    raw.parse().map_err(|_| DccParseError::InvalidNumber {
        field,
        value: raw.to_owned(),
    })
}
