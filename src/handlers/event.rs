//! Events delivered to handlers and the replies they return.

use futures_util::future::BoxFuture;
use slirc_proto::IrcString;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::HandlerResult;
use crate::dcc::DccConnection;
use crate::error::HandlerError;

/// Which stream a line belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Received from the IRC server.
    In,
    /// Sent by the bot to the IRC server.
    Out,
    /// Received on a DCC chat connection.
    DccIn,
    /// Sent on a DCC chat connection.
    DccOut,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::In, Self::Out, Self::DccIn, Self::DccOut];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::In => 0,
            Self::Out => 1,
            Self::DccIn => 2,
            Self::DccOut => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::DccIn => "dcc_in",
            Self::DccOut => "dcc_out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier handed out by `attach`, used to `detach`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Named captures of one pattern match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, IrcString>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<IrcString>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&IrcString> {
        self.0.get(name)
    }

    /// Like `get`, but a missing capture is a handler error.
    pub fn require(&self, name: &'static str) -> Result<&IrcString, HandlerError> {
        self.0.get(name).ok_or(HandlerError::MissingField(name))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IrcString)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy every field of `other` into `self`, overwriting on conflict.
    pub fn merge(&mut self, other: &Fields) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

impl<K: Into<String>, V: Into<IrcString>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One matched line, as seen by one handler.
#[derive(Clone, Debug)]
pub struct Event {
    /// The raw line.
    pub line: Arc<str>,
    pub direction: Direction,
    pub fields: Fields,
    /// The handler this event is delivered to, for self-detach.
    pub handler_id: HandlerId,
    /// The chat connection the line travelled on, for `DccIn`/`DccOut`.
    pub dcc: Option<DccConnection>,
}

impl Event {
    pub fn get(&self, name: &str) -> Option<&IrcString> {
        self.fields.get(name)
    }

    pub fn require(&self, name: &'static str) -> Result<&IrcString, HandlerError> {
        self.fields.require(name)
    }
}

/// What a handler produced.
pub enum Reply {
    /// Nothing to send.
    Nothing,
    /// Lines to send, in order, on the stream the event came from.
    Lines(Vec<String>),
    /// Work that finishes later; its own reply is delivered when it does.
    Deferred(BoxFuture<'static, HandlerResult>),
}

impl Reply {
    pub fn line(line: impl Into<String>) -> Self {
        Self::Lines(vec![line.into()])
    }

    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Lines(lines.into_iter().map(Into::into).collect())
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Deferred(Box::pin(future))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing => f.write_str("Nothing"),
            Self::Lines(lines) => f.debug_tuple("Lines").field(lines).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_require_reports_missing_name() {
        let fields: Fields = [("data", "abc")].into_iter().collect();
        assert_eq!(fields.require("data").unwrap(), "abc");
        assert!(matches!(
            fields.require("nope"),
            Err(HandlerError::MissingField("nope"))
        ));
    }

    #[test]
    fn fields_merge_overwrites() {
        let mut a: Fields = [("x", "1"), ("y", "2")].into_iter().collect();
        let b: Fields = [("y", "3")].into_iter().collect();
        a.merge(&b);
        assert_eq!(a.get("y").unwrap(), "3");
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn reply_lines_collects() {
        match Reply::lines(["A", "B"]) {
            Reply::Lines(lines) => assert_eq!(lines, vec!["A", "B"]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
