//! slirc-bot - IRC bot toolkit
//!
//! A line-oriented event engine for IRC clients: regex patterns bound to
//! handlers, an ordered dispatcher, request/response rendezvous, and a DCC
//! subsystem for chat and resumable file transfers.

pub mod bot;
pub mod config;
pub mod dcc;
pub mod error;
pub mod handlers;
pub mod network;
pub mod plugins;
pub mod telemetry;

pub use bot::{Bot, Outbox, Settings, WireReceiver};
pub use config::Config;
pub use dcc::{CloseReason, DccConnection, DccKind, DccManager, DccParams, DccState};
pub use error::{DccError, HandlerError, NetworkError, PatternError, PluginError};
pub use handlers::{
    Direction, Event, EventSpec, Fields, Handler, HandlerId, HandlerResult, Pattern, Reply,
    RendezvousResult,
};
