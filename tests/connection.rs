//! Server link tests against a scripted IRC server.

mod common;

use common::{TestServer, test_config};
use slirc_bot::{Bot, network, plugins};
use std::time::Duration;

#[tokio::test]
async fn test_registration_ping_and_quit() -> anyhow::Result<()> {
    let server = TestServer::bind().await?;
    let mut config = test_config();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = server.port();
    config.server.password = Some("hunter2".to_string());
    config.server.autojoins = vec!["#slirc".to_string()];

    let (bot, mut wire) = Bot::start(config);
    plugins::load(&bot, &plugins::builtin(), &["core".to_string()])?;
    let link = tokio::spawn({
        let bot = bot.clone();
        async move { network::run(bot, &mut wire).await }
    });

    let mut client = server.accept().await?;
    assert_eq!(client.recv().await?.as_deref(), Some("PASS hunter2"));
    assert_eq!(client.recv().await?.as_deref(), Some("NICK slircbot"));
    assert_eq!(
        client.recv().await?.as_deref(),
        Some("USER slircbot 0 * :slircbot")
    );

    client.send_raw(":irc.example.net 001 slircbot :Welcome").await?;
    assert_eq!(client.expect("JOIN").await?, "JOIN #slirc");

    client.send_raw("PING :abc123").await?;
    assert_eq!(client.expect("PONG").await?, "PONG :abc123");

    bot.shutdown();
    assert_eq!(client.expect("QUIT").await?, "QUIT :Shutting down");
    tokio::time::timeout(Duration::from_secs(5), link).await???;
    Ok(())
}

#[tokio::test]
async fn test_server_close_ends_run() -> anyhow::Result<()> {
    let server = TestServer::bind().await?;
    let mut config = test_config();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = server.port();

    let (bot, mut wire) = Bot::start(config);
    let link = tokio::spawn(async move { network::run(bot, &mut wire).await });

    let mut client = server.accept().await?;
    client.expect("USER").await?;
    drop(client);

    tokio::time::timeout(Duration::from_secs(5), link).await???;
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_is_an_error() {
    let server = TestServer::bind().await.unwrap();
    let port = server.port();
    drop(server);

    let mut config = test_config();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = port;
    let (bot, mut wire) = Bot::start(config);

    let err = network::run(bot, &mut wire).await.unwrap_err();
    assert!(matches!(err, network::NetworkError::Io(_)));
}
