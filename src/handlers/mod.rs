//! Event dispatch: pattern registry, dispatcher worker and rendezvous.
//!
//! Handlers are attached against a [`Pattern`] on one [`Direction`]. Every
//! line fed to the [`Dispatcher`] is matched against each bucket of that
//! direction in order, and matching handlers run on a single worker task in
//! the order they were selected.

mod dispatch;
mod event;
mod pattern;
mod registry;
mod rendezvous;

pub use dispatch::{DispatchQueue, Dispatcher};
pub use event::{Direction, Event, Fields, HandlerId, Reply};
pub use pattern::{CompiledPattern, Pattern, substitute};
pub use registry::{Registry, WorkItem};
pub use rendezvous::{EventSpec, Rendezvous, RendezvousResult};

pub(crate) use dispatch::run_worker;

use std::sync::Arc;

use crate::bot::Bot;
use crate::error::HandlerError;

/// Result type returned by handlers.
pub type HandlerResult = Result<Reply, HandlerError>;

/// Something that reacts to matched lines.
///
/// Handlers run one at a time on the dispatch worker and must not block.
/// Work that waits on the network should be returned as
/// [`Reply::Deferred`].
pub trait Handler: Send + Sync + 'static {
    fn call(&self, bot: &Arc<Bot>, event: &Event) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&Arc<Bot>, &Event) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, bot: &Arc<Bot>, event: &Event) -> HandlerResult {
        self(bot, event)
    }
}
