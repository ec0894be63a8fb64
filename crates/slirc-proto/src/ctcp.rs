//! CTCP (Client-to-Client Protocol) quoting.
//!
//! CTCP payloads ride inside PRIVMSG (queries) and NOTICE (replies) bodies,
//! delimited by `\x01`.
//!
//! # Reference
//! - CTCP specification: <https://modern.ircdocs.horse/ctcp.html>
//!
//! # Example
//!
//! ```
//! use slirc_proto::ctcp;
//!
//! assert_eq!(ctcp::quote("ACTION waves"), "\x01ACTION waves\x01");
//! assert_eq!(ctcp::unquote("\x01VERSION\x01"), Some("VERSION"));
//! assert_eq!(ctcp::unquote("hello"), None);
//! ```

/// The CTCP delimiter character (`\x01`).
pub const CTCP_DELIM: char = '\x01';

/// Wrap a payload in CTCP delimiters.
pub fn quote(payload: &str) -> String {
    format!("{CTCP_DELIM}{payload}{CTCP_DELIM}")
}

/// Strip CTCP delimiters from a message body.
///
/// The trailing delimiter is optional, as some clients omit it.
/// Returns `None` when the body is not CTCP or is empty.
pub fn unquote(text: &str) -> Option<&str> {
    let inner = text.strip_prefix(CTCP_DELIM)?;
    let inner = inner.strip_suffix(CTCP_DELIM).unwrap_or(inner);
    (!inner.is_empty()).then_some(inner)
}

/// Whether a message body is a CTCP payload.
pub fn is_ctcp(text: &str) -> bool {
    unquote(text).is_some()
}

/// Build an ACTION (`/me`) body.
pub fn action(text: &str) -> String {
    quote(&format!("ACTION {text}"))
}

/// Split a CTCP payload into its command and optional parameters.
pub fn split_command(payload: &str) -> (&str, Option<&str>) {
    match payload.split_once(' ') {
        Some((command, params)) if !params.is_empty() => (command, Some(params)),
        Some((command, _)) => (command, None),
        None => (payload, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote_without_trailing_delim() {
        assert_eq!(unquote("\x01PING 123"), Some("PING 123"));
    }

    #[test]
    fn test_unquote_empty() {
        assert_eq!(unquote("\x01\x01"), None);
        assert!(!is_ctcp("\x01"));
    }

    #[test]
    fn test_action() {
        assert_eq!(action("dances"), "\x01ACTION dances\x01");
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("DCC SEND a 1 2 3"), ("DCC", Some("SEND a 1 2 3")));
        assert_eq!(split_command("VERSION"), ("VERSION", None));
        assert_eq!(split_command("PING "), ("PING", None));
    }
}
