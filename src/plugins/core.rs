//! Connection upkeep: PING replies, nick tracking, autojoin.

use std::sync::Arc;
use tracing::{info, warn};

use super::Plugin;
use crate::bot::Bot;
use crate::error::PatternError;
use crate::handlers::{Event, HandlerResult, Pattern, Reply};

pub struct CorePlugin;

impl Plugin for CorePlugin {
    fn name(&self) -> &'static str {
        "core"
    }

    fn register(&self, bot: &Arc<Bot>) -> Result<(), PatternError> {
        bot.attach(Pattern::new(r"^PING :?(?P<data>.*)$"), ping)?;
        bot.attach(Pattern::new(r"^:(?P<srv>\S+) 001 (?P<me>\S+)"), welcome)?;
        bot.attach(Pattern::new(r"^:(?P<mask>\S+) NICK :?(?P<new_nick>\S+)"), nick_change)?;
        bot.attach(Pattern::new(r"^:\S+ 433 \S+ (?P<nick>\S+)"), nick_in_use)?;
        Ok(())
    }
}

fn ping(_bot: &Arc<Bot>, event: &Event) -> HandlerResult {
    let data = event.require("data")?;
    Ok(Reply::line(format!("PONG :{data}")))
}

fn welcome(bot: &Arc<Bot>, event: &Event) -> HandlerResult {
    let me = event.require("me")?;
    bot.set_nick(me)?;
    info!(server = ?event.get("srv"), nick = %me, "Registered");

    let joins = bot
        .config()
        .server
        .autojoins
        .iter()
        .map(|channel| format!("JOIN {channel}"));
    Ok(Reply::lines(joins))
}

fn nick_change(bot: &Arc<Bot>, event: &Event) -> HandlerResult {
    let mask = event.require("mask")?;
    let new_nick = event.require("new_nick")?;
    let ours = mask
        .nick()
        .is_some_and(|old| old.eq_ignore_ascii_case(&bot.nick()));
    if ours {
        bot.set_nick(new_nick)?;
    }
    Ok(Reply::Nothing)
}

fn nick_in_use(bot: &Arc<Bot>, event: &Event) -> HandlerResult {
    let taken = event.require("nick")?;
    if !taken.eq_ignore_ascii_case(&bot.nick()) {
        return Ok(Reply::Nothing);
    }
    let next = format!("{taken}_");
    warn!(nick = %taken, next = %next, "Nickname in use");
    bot.set_nick(&next)?;
    Ok(Reply::line(format!("NICK {next}")))
}
