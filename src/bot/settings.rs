//! Values substituted into event patterns.

use std::collections::HashMap;

use crate::config::Config;

/// Placeholder values for pattern compilation.
///
/// `{nick}` and `{cmd}` are always defined; everything under `[vars]` is
/// available by its key.
#[derive(Debug, Clone)]
pub struct Settings {
    nick: String,
    cmd: String,
    vars: HashMap<String, String>,
}

impl Settings {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            cmd: "!".to_string(),
            vars: HashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            nick: config.server.nick.clone(),
            cmd: config.bot.cmd.clone(),
            vars: config.vars.clone(),
        }
    }

    pub fn with_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = cmd.into();
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub(crate) fn set_nick(&mut self, nick: impl Into<String>) {
        self.nick = nick.into();
    }

    /// Resolve a placeholder name.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "nick" => Some(&self.nick),
            "cmd" => Some(&self.cmd),
            _ => self.vars.get(name).map(String::as_str),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_shadow_vars() {
        let settings = Settings::new("bot").with_var("nick", "other").with_var("chan", "#x");
        assert_eq!(settings.lookup("nick"), Some("bot"));
        assert_eq!(settings.lookup("cmd"), Some("!"));
        assert_eq!(settings.lookup("chan"), Some("#x"));
        assert_eq!(settings.lookup("missing"), None);
    }
}
