//! Plugins: bundles of handlers registered explicitly on a bot.
//!
//! A plugin may name plugins it needs loaded first; [`load`] registers
//! requirements before the plugins that need them, each exactly once.

mod core;
mod dcc;

pub use self::core::CorePlugin;
pub use self::dcc::DccPlugin;

use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::bot::Bot;
use crate::error::{PatternError, PluginError};

/// A named set of handlers.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Plugins that must be registered before this one.
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    fn register(&self, bot: &Arc<Bot>) -> Result<(), PatternError>;
}

/// The plugins shipped with the crate.
pub fn builtin() -> Vec<Box<dyn Plugin>> {
    vec![Box::new(CorePlugin), Box::new(DccPlugin)]
}

/// Register `names` (and what they require) from `available`.
///
/// Returns the plugin names in registration order.
pub fn load(
    bot: &Arc<Bot>,
    available: &[Box<dyn Plugin>],
    names: &[String],
) -> Result<Vec<&'static str>, PluginError> {
    let mut loader = Loader {
        available,
        loaded: Vec::new(),
        visiting: HashSet::new(),
    };
    for name in names {
        loader.visit(bot, name)?;
    }
    Ok(loader.loaded)
}

struct Loader<'a> {
    available: &'a [Box<dyn Plugin>],
    loaded: Vec<&'static str>,
    visiting: HashSet<String>,
}

impl Loader<'_> {
    fn visit(&mut self, bot: &Arc<Bot>, name: &str) -> Result<(), PluginError> {
        if self.loaded.iter().any(|l| *l == name) {
            return Ok(());
        }
        if !self.visiting.insert(name.to_string()) {
            return Err(PluginError::Cycle(name.to_string()));
        }

        let available = self.available;
        let plugin = available
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| PluginError::Unknown(name.to_string()))?;

        for required in plugin.requires() {
            self.visit(bot, required)?;
        }

        plugin
            .register(bot)
            .map_err(|source| PluginError::Register {
                plugin: plugin.name(),
                source,
            })?;
        info!(plugin = plugin.name(), "Plugin loaded");

        self.visiting.remove(name);
        self.loaded.push(plugin.name());
        Ok(())
    }
}
