//! Incoming DCC negotiation over CTCP.
//!
//! RESUME requests restart pending sends. With `dcc.auto_accept`, CHAT and
//! SEND offers are accepted; a SEND whose file is partly downloaded already
//! is resumed through a RESUME/ACCEPT exchange first.

use slirc_proto::dcc::safe_filename;
use slirc_proto::{DccMessage, IrcString};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

use super::Plugin;
use crate::bot::Bot;
use crate::dcc::{DccKind, DccParams};
use crate::error::{DccError, HandlerError, PatternError};
use crate::handlers::{Event, EventSpec, HandlerResult, Pattern, Reply};

const DCC_CTCP: &str = r"^:(?P<mask>\S+) PRIVMSG {nick} :\x01(?P<ctcp>DCC [^\x01]*)\x01?$";

pub struct DccPlugin;

impl Plugin for DccPlugin {
    fn name(&self) -> &'static str {
        "dcc"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["core"]
    }

    fn register(&self, bot: &Arc<Bot>) -> Result<(), PatternError> {
        bot.attach(Pattern::new(DCC_CTCP), on_dcc)?;
        Ok(())
    }
}

fn on_dcc(bot: &Arc<Bot>, event: &Event) -> HandlerResult {
    let mask = event.require("mask")?.clone();
    let message = DccMessage::parse(event.require("ctcp")?).map_err(DccError::from)?;
    let auto_accept = bot.dcc().config().auto_accept;

    match message {
        DccMessage::Resume {
            filename,
            port,
            position,
        } => {
            bot.dcc().resume(&mask, &filename, port, position)?;
            Ok(Reply::Nothing)
        }
        DccMessage::Accept { .. } => {
            // Answers to our own RESUME are picked up by the waiting rendezvous.
            debug!(peer = %mask, "DCC ACCEPT received");
            Ok(Reply::Nothing)
        }
        DccMessage::Chat { addr, port } if auto_accept => {
            let bot = Arc::clone(bot);
            Ok(Reply::deferred(async move {
                let params = DccParams::new().connect(addr, port);
                bot.dcc().create(DccKind::Chat, mask, params).await?;
                Ok(Reply::Nothing)
            }))
        }
        DccMessage::Send {
            filename,
            addr,
            port,
            size,
        } if auto_accept => Ok(Reply::deferred(accept_file(
            Arc::clone(bot),
            mask,
            Offer {
                filename,
                addr,
                port,
                size,
            },
        ))),
        other => {
            info!(peer = %mask, offer = %other, "DCC offer not accepted");
            Ok(Reply::Nothing)
        }
    }
}

struct Offer {
    filename: String,
    addr: IpAddr,
    port: u16,
    size: Option<u64>,
}

async fn accept_file(bot: Arc<Bot>, peer: IrcString, offer: Offer) -> HandlerResult {
    let path = bot
        .dcc()
        .config()
        .download_dir
        .join(safe_filename(&offer.filename));
    let existing = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta.len(),
        Err(_) => 0,
    };

    let resumable = existing > 0 && offer.size.is_some_and(|size| existing < size);
    let offset = if resumable {
        request_resume(&bot, &peer, &offer, existing).await?
    } else {
        0
    };

    let mut params = DccParams::new()
        .connect(offer.addr, offer.port)
        .file(path)
        .filename(offer.filename)
        .offset(offset);
    if let Some(size) = offer.size {
        params = params.size(size);
    }
    bot.dcc().create(DccKind::Get, peer, params).await?;
    Ok(Reply::Nothing)
}

/// Ask the sender to restart at `position`; 0 if it does not agree in time.
async fn request_resume(
    bot: &Arc<Bot>,
    peer: &IrcString,
    offer: &Offer,
    position: u64,
) -> Result<u64, HandlerError> {
    let nick = peer.nick().unwrap_or(peer.as_str());
    let accept = format!(
        r"^:{}!\S+ PRIVMSG {{nick}} :\x01DCC ACCEPT .+ {} (?P<position>\d+)\x01?$",
        regex::escape(nick),
        offer.port
    );
    let resume = DccMessage::Resume {
        filename: offer.filename.clone(),
        port: offer.port,
        position,
    };

    let reply = bot
        .await_events(vec![EventSpec::new(accept).final_event()])
        .send(format!("PRIVMSG {nick} :{}", resume.to_ctcp()))
        .await?;

    let agreed = reply.get("position").and_then(|p| p.parse::<u64>().ok());
    match agreed {
        Some(position) if !reply.timeout => {
            info!(peer = %nick, position, "DCC get resumed");
            Ok(position)
        }
        _ => {
            info!(peer = %nick, "No DCC ACCEPT, restarting from zero");
            Ok(0)
        }
    }
}
