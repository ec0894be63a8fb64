//! slircbot - Straylight IRC bot
//!
//! Connects to one server, loads the configured plugins and runs until the
//! server closes the link or the process is interrupted.

use slirc_bot::config::{Config, validate};
use slirc_bot::{Bot, network, plugins};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {}",
            errors.len(),
            config_path
        ));
    }

    info!(
        host = %config.server.host,
        port = config.server.port,
        nick = %config.server.nick,
        "Starting slircbot"
    );

    let plugin_names = config.bot.plugins.clone();
    let (bot, mut wire) = Bot::start(config);
    let loaded = plugins::load(&bot, &plugins::builtin(), &plugin_names)?;
    info!(plugins = ?loaded, "Plugins registered");

    let shutdown = bot.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            shutdown.shutdown();
        }
    });

    network::run(bot.clone(), &mut wire).await?;
    bot.dcc().close_all();
    info!("slircbot stopped");
    Ok(())
}
