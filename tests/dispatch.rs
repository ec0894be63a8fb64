//! Dispatcher integration tests.
//!
//! Lines go in through `Bot::dispatch` (or the outbox for outbound lines)
//! and come out as handler calls and wire lines.

mod common;

use common::{collected, collector, line_starting, next_line, settle, start_bot};
use slirc_bot::handlers::{Direction, Event, HandlerResult, Pattern, Reply};
use slirc_bot::plugins;
use slirc_bot::Bot;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// A handler that records `tag` on every call.
fn tagged(
    tag: &'static str,
    tx: mpsc::UnboundedSender<&'static str>,
) -> impl Fn(&Arc<Bot>, &Event) -> HandlerResult + Send + Sync + 'static {
    move |_: &Arc<Bot>, _: &Event| -> HandlerResult {
        let _ = tx.send(tag);
        Ok(Reply::Nothing)
    }
}

async fn drain(bot: &Arc<Bot>, rx: &mut mpsc::UnboundedReceiver<&'static str>) -> Vec<&'static str> {
    settle(bot).await;
    let mut seen = Vec::new();
    while let Ok(tag) = rx.try_recv() {
        seen.push(tag);
    }
    seen
}

#[tokio::test]
async fn test_ping_answered_and_custom_handler_runs_once() {
    let (bot, mut wire) = start_bot();
    plugins::load(&bot, &plugins::builtin(), &["core".to_string()]).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    bot.attach(Pattern::new(r"^PING :(?P<token>\S+)$"), move |_: &Arc<Bot>, event: &Event| -> HandlerResult {
        assert_eq!(event.get("token").unwrap(), "abc123");
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Reply::Nothing)
    })
    .unwrap();

    bot.dispatch("PING :abc123");

    assert_eq!(next_line(&mut wire).await, "PONG :abc123");
    settle(&bot).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_only_matching_pattern_runs() {
    let (bot, _wire) = start_bot();
    let (tx, mut rx) = mpsc::unbounded_channel();
    bot.attach(Pattern::new("^P1$"), tagged("p1", tx.clone())).unwrap();
    bot.attach(Pattern::new("^P2$"), tagged("p2", tx)).unwrap();

    bot.dispatch("P1");
    assert_eq!(drain(&bot, &mut rx).await, vec!["p1"]);

    bot.dispatch("P2");
    assert_eq!(drain(&bot, &mut rx).await, vec!["p2"]);

    bot.dispatch("P3");
    assert!(drain(&bot, &mut rx).await.is_empty());
}

#[tokio::test]
async fn test_shared_pattern_runs_in_attach_order() {
    let (bot, _wire) = start_bot();
    let (tx, mut rx) = mpsc::unbounded_channel();
    bot.attach(Pattern::new("^HELLO"), tagged("first", tx.clone())).unwrap();
    bot.attach(Pattern::new("^HELLO"), tagged("second", tx.clone())).unwrap();
    bot.attach_priority(Pattern::new("^HELLO"), tagged("urgent", tx))
        .unwrap();

    assert_eq!(bot.registry().len(Direction::In), 1);
    bot.dispatch("HELLO world");
    assert_eq!(drain(&bot, &mut rx).await, vec!["urgent", "first", "second"]);
}

#[tokio::test]
async fn test_detach_last_handler_removes_pattern() {
    let (bot, _wire) = start_bot();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = bot.attach(Pattern::new("^GONE$"), tagged("gone", tx)).unwrap();

    assert!(bot.detach(id));
    assert!(!bot.detach(id));
    assert!(bot.registry().buckets(Direction::In).is_empty());

    bot.dispatch("GONE");
    assert!(drain(&bot, &mut rx).await.is_empty());
}

#[tokio::test]
async fn test_handler_can_detach_itself() {
    let (bot, _wire) = start_bot();
    let (tx, mut rx) = mpsc::unbounded_channel();
    bot.attach(Pattern::new("^ONCE$"), move |bot: &Arc<Bot>, event: &Event| -> HandlerResult {
        bot.detach(event.handler_id);
        let _ = tx.send("once");
        Ok(Reply::Nothing)
    })
    .unwrap();

    bot.dispatch("ONCE");
    bot.dispatch("ONCE");
    // Both lines were matched before the first call detached the handler.
    assert_eq!(drain(&bot, &mut rx).await, vec!["once", "once"]);

    bot.dispatch("ONCE");
    assert!(drain(&bot, &mut rx).await.is_empty());
    assert_eq!(bot.registry().handler_count(Direction::In), 0);
}

#[tokio::test]
async fn test_panicking_handler_does_not_stop_siblings() {
    let (bot, _wire) = start_bot();
    let (tx, mut rx) = mpsc::unbounded_channel();
    bot.attach(Pattern::new("^BOOM$"), |_: &Arc<Bot>, _: &Event| -> HandlerResult {
        panic!("handler failure")
    })
    .unwrap();
    bot.attach(Pattern::new("^BOOM$"), tagged("survivor", tx.clone())).unwrap();
    bot.attach(Pattern::new("^BOOM$"), |_: &Arc<Bot>, event: &Event| -> HandlerResult {
        event.require("missing")?;
        Ok(Reply::Nothing)
    })
    .unwrap();
    bot.attach(Pattern::new("^BOOM$"), tagged("last", tx)).unwrap();

    bot.dispatch("BOOM");
    bot.dispatch("BOOM");
    assert_eq!(
        drain(&bot, &mut rx).await,
        vec!["survivor", "last", "survivor", "last"]
    );
}

#[tokio::test]
async fn test_reply_lines_sent_in_order() {
    let (bot, mut wire) = start_bot();
    bot.attach(Pattern::new(r"^:\S+ PRIVMSG (?P<target>\S+) :!count$"), |_: &Arc<Bot>, event: &Event| -> HandlerResult {
        let target = event.require("target")?.to_string();
        Ok(Reply::lines((1..=3).map(move |n| format!("PRIVMSG {target} :{n}"))))
    })
    .unwrap();

    bot.dispatch(":alice!a@example.org PRIVMSG #slirc :!count");

    assert_eq!(next_line(&mut wire).await, "PRIVMSG #slirc :1");
    assert_eq!(next_line(&mut wire).await, "PRIVMSG #slirc :2");
    assert_eq!(next_line(&mut wire).await, "PRIVMSG #slirc :3");
}

#[tokio::test]
async fn test_deferred_reply_does_not_block_later_lines() {
    let (bot, mut wire) = start_bot();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    let release_rx = parking_lot::Mutex::new(Some(release_rx));

    bot.attach(Pattern::new("^SLOW$"), move |_: &Arc<Bot>, _: &Event| -> HandlerResult {
        let rx = release_rx.lock().take();
        Ok(Reply::deferred(async move {
            if let Some(rx) = rx {
                let _ = rx.await;
            }
            Ok(Reply::line("PRIVMSG #slirc :slow"))
        }))
    })
    .unwrap();
    bot.attach(Pattern::new("^FAST$"), |_: &Arc<Bot>, _: &Event| -> HandlerResult {
        Ok(Reply::line("PRIVMSG #slirc :fast"))
    })
    .unwrap();

    bot.dispatch("SLOW");
    bot.dispatch("FAST");
    assert_eq!(next_line(&mut wire).await, "PRIVMSG #slirc :fast");

    release_tx.send(()).unwrap();
    assert_eq!(next_line(&mut wire).await, "PRIVMSG #slirc :slow");
}

#[tokio::test]
async fn test_outbound_lines_are_dispatched() {
    let (bot, mut wire) = start_bot();
    let (handler, mut rx) = collector();
    bot.attach(Pattern::outbound(r"^PRIVMSG (?P<target>\S+) :(?P<text>.*)$"), handler)
        .unwrap();

    bot.outbox().privmsg("#slirc", "hello there").unwrap();

    let fields = collected(&mut rx).await;
    assert_eq!(fields.get("target").unwrap(), "#slirc");
    assert_eq!(fields.get("text").unwrap(), "hello there");
    assert_eq!(next_line(&mut wire).await, "PRIVMSG #slirc :hello there");

    // Inbound tables are separate.
    bot.dispatch("PRIVMSG #slirc :not outbound");
    settle(&bot).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_nick_placeholder_follows_nick_changes() {
    let (bot, mut wire) = start_bot();
    plugins::load(&bot, &plugins::builtin(), &["core".to_string()]).unwrap();

    let (handler, mut rx) = collector();
    bot.attach(Pattern::new(r"^:(?P<mask>\S+) PRIVMSG {nick} :(?P<text>.*)$"), handler)
        .unwrap();
    assert!(
        bot.registry()
            .buckets(Direction::In)
            .iter()
            .any(|b| b.contains("PRIVMSG slircbot :"))
    );

    bot.dispatch(":irc.example.net 001 slirc2 :Welcome");
    settle(&bot).await;
    assert_eq!(bot.nick(), "slirc2");

    bot.dispatch(":alice!a@example.org PRIVMSG slircbot :old nick");
    bot.dispatch(":alice!a@example.org PRIVMSG slirc2 :new nick");
    let fields = collected(&mut rx).await;
    assert_eq!(fields.get("text").unwrap(), "new nick");
    assert_eq!(fields.get("mask").unwrap().nick(), Some("alice"));

    // 433 for our nick moves us to nick_.
    bot.dispatch(":irc.example.net 433 * slirc2 :Nickname is already in use");
    assert_eq!(line_starting(&mut wire, "NICK").await, "NICK slirc2_");
    settle(&bot).await;
    assert_eq!(bot.nick(), "slirc2_");
}
