//! Event patterns: regex text with `{name}` placeholders.
//!
//! Placeholders are resolved against [`Settings`] before the regex is
//! compiled, with the substituted value escaped so it matches literally.
//! `{{` and `}}` produce literal braces. A brace that does not open an
//! identifier (`\d{2,3}`, `\p{L}`) is regex syntax and passes through.

use regex::Regex;

use super::{Direction, Fields};
use crate::bot::Settings;
use crate::error::PatternError;

/// A pattern as registered, before substitution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    direction: Direction,
}

impl Pattern {
    /// A pattern over lines received from the server.
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_direction(source, Direction::In)
    }

    /// A pattern over lines the bot sends.
    pub fn outbound(source: impl Into<String>) -> Self {
        Self::with_direction(source, Direction::Out)
    }

    pub fn with_direction(source: impl Into<String>, direction: Direction) -> Self {
        Self {
            source: source.into(),
            direction,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Substitute placeholders without compiling.
    pub fn expand(&self, settings: &Settings) -> Result<String, PatternError> {
        substitute(&self.source, settings)
    }

    pub fn compile(&self, settings: &Settings) -> Result<CompiledPattern, PatternError> {
        CompiledPattern::new(self.expand(settings)?)
    }
}

impl From<&str> for Pattern {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

/// A substituted and compiled pattern.
#[derive(Clone, Debug)]
pub struct CompiledPattern {
    text: String,
    regex: Regex,
}

impl CompiledPattern {
    pub fn new(text: String) -> Result<Self, PatternError> {
        let regex = Regex::new(&text)?;
        Ok(Self { text, regex })
    }

    /// The substituted pattern text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Search `line`; on a match, return every named group that took part.
    pub fn captures(&self, line: &str) -> Option<Fields> {
        let caps = self.regex.captures(line)?;
        let mut fields = Fields::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                fields.insert(name, m.as_str());
            }
        }
        Some(fields)
    }
}

fn is_ident(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// True when `out` ends in an odd run of backslashes.
fn is_escaped(out: &str) -> bool {
    out.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

/// Replace `{name}` placeholders in `source` with escaped settings values.
pub fn substitute(source: &str, settings: &Settings) -> Result<String, PatternError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut offset = 0;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let brace = rest.as_bytes()[pos];
        let after = &rest[pos + 1..];

        if is_escaped(&out) {
            out.push(char::from(brace));
            rest = after;
            offset += pos + 1;
            continue;
        }

        if brace == b'}' {
            // `}}` is an escaped brace; a lone `}` closes regex syntax.
            out.push('}');
            let skip = if after.starts_with('}') { 2 } else { 1 };
            rest = &rest[pos + skip..];
            offset += pos + skip;
            continue;
        }

        if after.starts_with('{') {
            out.push('{');
            rest = &rest[pos + 2..];
            offset += pos + 2;
            continue;
        }

        let Some(close) = after.find('}') else {
            return Err(PatternError::UnbalancedBrace(offset + pos));
        };
        let name = &after[..close];
        let unicode_class = out.ends_with("\\p") || out.ends_with("\\P");

        if is_ident(name) && !unicode_class {
            let value = settings
                .lookup(name)
                .ok_or_else(|| PatternError::UnknownPlaceholder(name.to_string()))?;
            out.push_str(&regex::escape(value));
        } else {
            out.push('{');
            out.push_str(name);
            out.push('}');
        }
        let consumed = pos + 1 + close + 1;
        rest = &rest[consumed..];
        offset += consumed;
    }

    out.push_str(rest);
    Ok(out)
}
