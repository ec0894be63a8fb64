//! Protocol strings with derived properties.
//!
//! Values captured from IRC lines are wrapped in [`IrcString`], which keeps
//! the raw text and exposes what it looks like on the wire: a user mask
//! (`nick!user@host`), a channel, a bare nickname or a server name.
//!
//! # Example
//!
//! ```
//! use slirc_proto::IrcString;
//!
//! let mask = IrcString::from("dan!~d@example.org");
//! assert_eq!(mask.nick(), Some("dan"));
//! assert_eq!(mask.host(), Some("example.org"));
//! assert!(!mask.is_channel());
//! assert!(IrcString::from("#rust").is_channel());
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Characters allowed at the start of a channel name (RFC 2812 section 1.3).
const CHANNEL_PREFIXES: [char; 4] = ['#', '&', '+', '!'];

/// An owned protocol string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IrcString(String);

impl IrcString {
    /// Wrap a string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the raw text.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Nickname part of a user mask, or the whole string if it is a bare nick.
    pub fn nick(&self) -> Option<&str> {
        match self.0.split_once('!') {
            Some((nick, _)) if !nick.is_empty() => Some(nick),
            Some(_) => None,
            None if self.is_nick() => Some(&self.0),
            None => None,
        }
    }

    /// Username part of `nick!user@host`.
    pub fn user(&self) -> Option<&str> {
        let (_, rest) = self.0.split_once('!')?;
        rest.split_once('@').map(|(user, _)| user)
    }

    /// Host part of `nick!user@host`.
    pub fn host(&self) -> Option<&str> {
        let (_, rest) = self.0.split_once('!')?;
        rest.split_once('@').map(|(_, host)| host)
    }

    /// `user@host` part of a user mask.
    pub fn userhost(&self) -> Option<&str> {
        self.0.split_once('!').map(|(_, rest)| rest)
    }

    /// Whether this is a full `nick!user@host` mask.
    pub fn is_user_mask(&self) -> bool {
        self.user().is_some()
    }

    /// Whether this looks like a channel name.
    pub fn is_channel(&self) -> bool {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(c) if CHANNEL_PREFIXES.contains(&c) => {}
            _ => return false,
        }
        self.0.len() > 1
            && chars.all(|c| c != ' ' && c != ',' && c != '\x07' && !c.is_control())
    }

    /// Whether this looks like a bare nickname.
    pub fn is_nick(&self) -> bool {
        let mut chars = self.0.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        (first.is_ascii_alphabetic() || is_special(first))
            && chars.all(|c| c.is_ascii_alphanumeric() || is_special(c) || c == '-')
    }

    /// Whether this looks like a server name (`irc.example.net`).
    pub fn is_server(&self) -> bool {
        !self.0.is_empty()
            && self.0.contains('.')
            && !self.0.contains(['!', '@', ' '])
            && !self.is_channel()
    }
}

fn is_special(c: char) -> bool {
    matches!(c, '[' | ']' | '\\' | '`' | '_' | '^' | '{' | '|' | '}')
}

impl Deref for IrcString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for IrcString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for IrcString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IrcString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IrcString {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for IrcString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for IrcString {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for IrcString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_mask_parts() {
        let mask = IrcString::from("gawel!~g@irc3.org");
        assert_eq!(mask.nick(), Some("gawel"));
        assert_eq!(mask.user(), Some("~g"));
        assert_eq!(mask.host(), Some("irc3.org"));
        assert_eq!(mask.userhost(), Some("~g@irc3.org"));
        assert!(mask.is_user_mask());
        assert!(!mask.is_nick());
    }

    #[test]
    fn test_bare_nick() {
        let nick = IrcString::from("[bot]_2");
        assert!(nick.is_nick());
        assert_eq!(nick.nick(), Some("[bot]_2"));
        assert_eq!(nick.host(), None);
    }

    #[test]
    fn test_valid_channels() {
        assert!(IrcString::from("#channel").is_channel());
        assert!(IrcString::from("&local").is_channel());
        assert!(IrcString::from("+modeless").is_channel());
        assert!(IrcString::from("!safe12345").is_channel());
    }

    #[test]
    fn test_invalid_channels() {
        assert!(!IrcString::from("channel").is_channel());
        assert!(!IrcString::from("#chan nel").is_channel());
        assert!(!IrcString::from("#chan,nel").is_channel());
        assert!(!IrcString::from("#").is_channel());
        assert!(!IrcString::from("").is_channel());
    }

    #[test]
    fn test_server_name() {
        assert!(IrcString::from("irc.libera.chat").is_server());
        assert!(!IrcString::from("nick").is_server());
        assert_eq!(IrcString::from("irc.libera.chat").nick(), None);
    }

    #[test]
    fn test_str_comparisons() {
        let s = IrcString::from("abc123");
        assert_eq!(s, "abc123");
        assert_eq!(&*s, "abc123");
        assert_eq!(s.to_string(), "abc123");
    }
}
