//! Wait for a set of server replies, optionally after sending a line.
//!
//! ```ignore
//! let whois = bot
//!     .await_events(vec![
//!         EventSpec::new(r"^:\S+ 311 \S+ (?P<nick>\S+) (?P<user>\S+) (?P<host>\S+)"),
//!         EventSpec::new(r"^:\S+ 318 \S+ (?P<nick>\S+) ").final_event(),
//!     ])
//!     .send("WHOIS gawel")
//!     .timeout(Duration::from_secs(5))
//!     .await?;
//! ```
//!
//! Temporary handlers are attached with priority and are always detached
//! when the wait ends: on a final match, once every non-multi event has
//! matched, on timeout, or when the awaiting future is dropped.

use parking_lot::Mutex;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

use super::{Event, Fields, HandlerId, HandlerResult, Pattern, Registry, Reply};
use crate::bot::Bot;
use crate::error::PatternError;

/// One event to wait for.
#[derive(Clone, Debug)]
pub struct EventSpec {
    pattern: String,
    final_: bool,
    multi: bool,
}

impl EventSpec {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            final_: false,
            multi: false,
        }
    }

    /// Matching this event ends the wait.
    pub fn final_event(mut self) -> Self {
        self.final_ = true;
        self
    }

    /// This event may match any number of times.
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_final(&self) -> bool {
        self.final_
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }
}

/// Outcome of a rendezvous.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RendezvousResult {
    /// The wait ended because time ran out.
    pub timeout: bool,
    /// Fields of every terminal match, in arrival order.
    pub results: Vec<Fields>,
    /// The fields of the only result, when there was exactly one.
    pub fields: Fields,
}

impl RendezvousResult {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.as_str())
    }
}

#[derive(Default)]
struct WaitState {
    done: bool,
    armed: bool,
    results: Vec<Fields>,
    terminal: Vec<HandlerId>,
    /// Non-multi handlers that already fired, possibly before being recorded.
    fired: Vec<HandlerId>,
    extra: Vec<HandlerId>,
    tx: Option<oneshot::Sender<()>>,
}

type Shared = Arc<Mutex<WaitState>>;

/// Mark the wait done and detach everything. Only the first call acts.
fn finish(state: &Mutex<WaitState>, registry: &Registry) -> bool {
    let (ids, tx) = {
        let mut s = state.lock();
        if s.done {
            return false;
        }
        s.done = true;
        let mut ids = std::mem::take(&mut s.terminal);
        ids.append(&mut s.extra);
        (ids, s.tx.take())
    };
    for id in ids {
        registry.detach(id);
    }
    if let Some(tx) = tx {
        let _ = tx.send(());
    }
    true
}

struct Cleanup {
    state: Shared,
    registry: Arc<Registry>,
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        finish(&self.state, &self.registry);
    }
}

/// A pending wait, built by [`Bot::await_events`]. Await it to run.
pub struct Rendezvous {
    bot: Arc<Bot>,
    events: Vec<EventSpec>,
    extra: Vec<EventSpec>,
    send_line: Option<String>,
    timeout: Duration,
}

impl Rendezvous {
    pub(crate) fn new(bot: Arc<Bot>, events: Vec<EventSpec>) -> Self {
        let timeout = bot.config().bot.rendezvous_timeout();
        Self {
            bot,
            events,
            extra: Vec::new(),
            send_line: None,
            timeout,
        }
    }

    /// Events that are logged while waiting but do not count as results.
    pub fn extra(mut self, extra: Vec<EventSpec>) -> Self {
        self.extra = extra;
        self
    }

    /// Line sent once every temporary handler is in place.
    pub fn send(mut self, line: impl Into<String>) -> Self {
        self.send_line = Some(line.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(self) -> Result<RendezvousResult, PatternError> {
        let Rendezvous {
            bot,
            events,
            extra,
            send_line,
            timeout,
        } = self;
        let registry = Arc::clone(bot.registry());
        let (tx, rx) = oneshot::channel();
        let state: Shared = Arc::new(Mutex::new(WaitState {
            tx: Some(tx),
            ..WaitState::default()
        }));
        let cleanup = Cleanup {
            state: Arc::clone(&state),
            registry: Arc::clone(&registry),
        };

        // Priority attach prepends, so go backwards to keep the given order.
        let expected = events.len();
        for spec in events.into_iter().rev() {
            let pattern = Pattern::new(spec.pattern.clone());
            let id = bot.attach_priority(pattern, terminal(&state, spec))?;
            let mut s = state.lock();
            if !s.fired.contains(&id) {
                s.terminal.push(id);
            }
        }
        for spec in extra.into_iter().rev() {
            let pattern = spec.pattern.clone();
            let handler = move |_: &Arc<Bot>, event: &Event| -> HandlerResult {
                debug!(pattern = %pattern, line = %event.line, "Extra event while waiting");
                Ok(Reply::Nothing)
            };
            let id = bot.attach_priority(Pattern::new(spec.pattern), handler)?;
            state.lock().extra.push(id);
        }

        // Every non-multi event may already have matched while attaching.
        let satisfied = {
            let mut s = state.lock();
            s.armed = true;
            expected > 0 && s.terminal.is_empty()
        };
        if satisfied {
            finish(&state, &registry);
        }

        if let Some(line) = send_line {
            if let Err(e) = bot.outbox().send_line(line) {
                debug!(error = %e, "Rendezvous line not sent");
            }
        }

        let timed_out = match tokio::time::timeout(timeout, rx).await {
            Ok(_) => false,
            // A match may have finished the wait just as time ran out.
            Err(_) => finish(&state, &registry),
        };
        drop(cleanup);

        let results = std::mem::take(&mut state.lock().results);
        let fields = match results.as_slice() {
            [only] => only.clone(),
            _ => Fields::new(),
        };
        Ok(RendezvousResult {
            timeout: timed_out,
            results,
            fields,
        })
    }
}

fn terminal(
    state: &Shared,
    spec: EventSpec,
) -> impl Fn(&Arc<Bot>, &Event) -> HandlerResult + Send + Sync + use<> {
    let state = Arc::clone(state);
    move |bot: &Arc<Bot>, event: &Event| -> HandlerResult {
        let mut s = state.lock();
        if s.done {
            return Ok(Reply::Nothing);
        }
        s.results.push(event.fields.clone());

        if spec.final_ {
            drop(s);
            finish(&state, bot.registry());
        } else if !spec.multi {
            s.terminal.retain(|id| *id != event.handler_id);
            s.fired.push(event.handler_id);
            let satisfied = s.armed && s.terminal.is_empty();
            drop(s);
            bot.registry().detach(event.handler_id);
            if satisfied {
                finish(&state, bot.registry());
            }
        }
        Ok(Reply::Nothing)
    }
}

impl IntoFuture for Rendezvous {
    type Output = Result<RendezvousResult, PatternError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}
