//! dfadev - byte-stream DFA device host
//!
//! Serves the automaton over TCP and hands its state to the next host
//! version on a live update.

use dfadev_exchange::{initialize, publish_snapshot, DirExchange, Exchange};
use dfadev_server::{Config, Dispatcher, Server, ServerConfig, CONFIG_ENV};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Defaults, then DFADEV_CONFIG, then env overrides. Any failure is fatal.
    let config = Config::load().map_err(|e| {
        tracing::error!("Failed to load config: {}", e);
        e
    })?;
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        tracing::info!("Loaded config from {}", path);
    }

    tracing::info!("Starting dfadev host");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Exchange directory: {}", config.handoff.exchange_dir.display());
    tracing::info!("  Lifecycle: {}", config.handoff.init);

    let exchange: Arc<dyn Exchange> = Arc::new(DirExchange::open(&config.handoff.exchange_dir)?);

    let startup = initialize(
        config.handoff.init,
        config.engine.engine_config(),
        exchange.as_ref(),
    );
    let (dispatcher, handle) = Dispatcher::new(startup, exchange.clone());

    let server = Server::new(ServerConfig::from(&config.network), handle);
    let dispatcher = dispatcher.with_shutdown(server.shutdown_sender()).spawn();

    // Spawn shutdown signal handler
    let shutdown = server.shutdown_sender();
    let signal_handle = tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        let _ = shutdown.send(());
    });

    // Run server (blocks until shutdown or HANDOFF)
    server.run().await?;

    // The dispatcher stops once the last connection lets go of it.
    drop(server);
    signal_handle.abort();
    let outcome = dispatcher.await?;

    if config.handoff.publish_on_shutdown && !outcome.handed_off {
        match publish_snapshot(&outcome.engine, exchange.as_ref()) {
            Ok(()) => tracing::info!("Published automaton on shutdown"),
            Err(e) => tracing::error!("Failed to publish automaton on shutdown: {}", e),
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}
