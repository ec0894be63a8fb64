//! Dispatcher and its worker task.
//!
//! `dispatch` snapshots the matching handlers and queues them; the worker
//! runs queued batches strictly in arrival order, one handler at a time.
//! A failing or panicking handler is logged and does not stop the rest.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, warn};

use super::{Direction, Event, HandlerResult, Registry, Reply, WorkItem};
use crate::bot::Bot;
use crate::dcc::DccConnection;
use crate::telemetry::spans;

/// Feeds lines to the registry and queues the matching handlers.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    queue: mpsc::UnboundedSender<Vec<WorkItem>>,
}

/// Receiving end of the dispatch queue, consumed by the worker.
pub struct DispatchQueue(mpsc::UnboundedReceiver<Vec<WorkItem>>);

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> (Self, DispatchQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                registry,
                queue: tx,
            },
            DispatchQueue(rx),
        )
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Queue every handler matching `line`. Returns how many were selected.
    pub fn dispatch(&self, line: &str, direction: Direction) -> usize {
        self.enqueue(self.registry.matches(line, direction))
    }

    /// Like `dispatch`, for a line travelling on a DCC chat connection.
    pub fn dispatch_dcc(&self, line: &str, direction: Direction, conn: &DccConnection) -> usize {
        let mut items = self.registry.matches(line, direction);
        for item in &mut items {
            item.event.dcc = Some(conn.clone());
        }
        self.enqueue(items)
    }

    fn enqueue(&self, items: Vec<WorkItem>) -> usize {
        let count = items.len();
        if count > 0 && self.queue.send(items).is_err() {
            debug!("Dispatch worker gone, dropping batch");
            return 0;
        }
        count
    }
}

/// Run queued batches until every dispatcher handle is dropped.
pub(crate) async fn run_worker(bot: Arc<Bot>, queue: DispatchQueue) {
    let DispatchQueue(mut rx) = queue;
    while let Some(batch) = rx.recv().await {
        for item in batch {
            invoke(&bot, item);
        }
    }
    debug!("Dispatch worker stopped");
}

fn invoke(bot: &Arc<Bot>, item: WorkItem) {
    let WorkItem { handler, event } = item;
    let _enter = spans::dispatch(event.direction, event.handler_id).entered();

    match std::panic::catch_unwind(AssertUnwindSafe(|| handler.call(bot, &event))) {
        Ok(Ok(reply)) => deliver(bot, reply, &event),
        Ok(Err(e)) => warn!(
            error = %e,
            code = e.error_code(),
            line = %event.line,
            "Handler failed"
        ),
        Err(_) => error!(line = %event.line, "Handler panicked"),
    }
}

fn deliver(bot: &Arc<Bot>, reply: Reply, event: &Event) {
    match reply {
        Reply::Nothing => {}
        Reply::Lines(lines) => {
            for line in lines {
                let sent = match &event.dcc {
                    Some(conn) => conn.send_line(line).map_err(|e| e.to_string()),
                    None => bot.outbox().send_line(line).map_err(|e| e.to_string()),
                };
                if let Err(e) = sent {
                    warn!(error = %e, "Reply dropped");
                    break;
                }
            }
        }
        Reply::Deferred(future) => {
            let bot = Arc::clone(bot);
            let event = event.clone();
            let span = spans::dispatch(event.direction, event.handler_id);
            tokio::spawn(
                async move {
                    let result: std::thread::Result<HandlerResult> =
                        AssertUnwindSafe(future).catch_unwind().await;
                    match result {
                        Ok(Ok(reply)) => deliver(&bot, reply, &event),
                        Ok(Err(e)) => warn!(
                            error = %e,
                            code = e.error_code(),
                            line = %event.line,
                            "Deferred handler failed"
                        ),
                        Err(_) => error!(line = %event.line, "Deferred handler panicked"),
                    }
                }
                .instrument(span),
            );
        }
    }
}
