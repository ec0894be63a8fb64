//! The bot context shared by handlers, plugins and the network layer.

mod outbox;
mod settings;

pub use outbox::Outbox;
pub use settings::Settings;

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::dcc::DccManager;
use crate::error::PatternError;
use crate::handlers::{
    Direction, Dispatcher, EventSpec, Handler, HandlerId, Pattern, Registry, Rendezvous,
    run_worker,
};

/// Lines that passed the outbound dispatch pass, ready for the socket.
pub type WireReceiver = mpsc::UnboundedReceiver<String>;

/// Shared bot state.
pub struct Bot {
    config: Config,
    settings: RwLock<Settings>,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    outbox: Outbox,
    dcc: DccManager,
    shutdown: CancellationToken,
}

impl Bot {
    /// Build the bot and spawn its dispatch worker and outbound pump.
    ///
    /// Must be called from within a tokio runtime. The returned receiver
    /// yields every line to write to the server.
    pub fn start(config: Config) -> (Arc<Self>, WireReceiver) {
        let registry = Arc::new(Registry::new());
        let (dispatcher, queue) = Dispatcher::new(Arc::clone(&registry));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (wire_tx, wire_rx) = mpsc::unbounded_channel();
        let outbox = Outbox::new(out_tx, config.server.max_line_length);
        let dcc = DccManager::new(
            config.dcc.clone(),
            config.server.encoding.clone(),
            dispatcher.clone(),
            outbox.clone(),
        );

        let bot = Arc::new(Self {
            settings: RwLock::new(Settings::from_config(&config)),
            config,
            registry,
            dispatcher,
            outbox,
            dcc,
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(run_worker(Arc::clone(&bot), queue));

        let dispatcher = bot.dispatcher.clone();
        tokio::spawn(async move {
            while let Some(line) = out_rx.recv().await {
                dispatcher.dispatch(&line, Direction::Out);
                if wire_tx.send(line).is_err() {
                    debug!("Wire receiver dropped, discarding outgoing line");
                }
            }
        });

        (bot, wire_rx)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current nickname.
    pub fn nick(&self) -> String {
        self.settings.read().nick().to_string()
    }

    /// Snapshot of the current placeholder values.
    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Change the nickname and recompile every pattern against it.
    pub fn set_nick(&self, nick: &str) -> Result<(), PatternError> {
        let mut settings = self.settings.write();
        if settings.nick() == nick {
            return Ok(());
        }
        let previous = settings.nick().to_string();
        settings.set_nick(nick);
        if let Err(e) = self.registry.recompile(&settings) {
            settings.set_nick(previous);
            return Err(e);
        }
        info!(nick = %nick, "Nickname changed");
        Ok(())
    }

    pub fn attach(&self, pattern: Pattern, handler: impl Handler) -> Result<HandlerId, PatternError> {
        let settings = self.settings.read();
        self.registry.attach(pattern, Arc::new(handler), false, &settings)
    }

    /// Attach ahead of every existing handler for the same line.
    pub fn attach_priority(
        &self,
        pattern: Pattern,
        handler: impl Handler,
    ) -> Result<HandlerId, PatternError> {
        let settings = self.settings.read();
        self.registry.attach(pattern, Arc::new(handler), true, &settings)
    }

    pub fn detach(&self, id: HandlerId) -> bool {
        self.registry.detach(id)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Feed a line received from the server.
    pub fn dispatch(&self, line: &str) -> usize {
        self.dispatcher.dispatch(line, Direction::In)
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn dcc(&self) -> &DccManager {
        &self.dcc
    }

    /// Start a rendezvous over `events`; configure it, then `.await` it.
    pub fn await_events(self: &Arc<Self>, events: Vec<EventSpec>) -> Rendezvous {
        Rendezvous::new(Arc::clone(self), events)
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Ask the connection to quit and close every DCC connection.
    pub fn shutdown(&self) {
        self.dcc.close_all();
        self.shutdown.cancel();
    }
}
