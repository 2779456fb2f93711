mod broadcast;
mod config;
mod error;
mod listener;
mod protocol;
mod registry;
mod session;
mod state;

use std::net::SocketAddr;
use tokio::sync::watch;

use config::{generate_config_template, Config};
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "parley_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "parley_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("parley server v{} starting", env!("CARGO_PKG_VERSION"));

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port).parse()?;
    let listener = listener::bind(addr)?;
    tracing::info!("Listening on {}", addr);

    // Ctrl-C flips the shutdown signal; the acceptor and every session
    // watch it and unwind on their own.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to listen for shutdown signal");
                // Keep the sender alive so sessions don't mistake a dropped
                // channel for a shutdown request.
                std::future::pending::<()>().await;
            }
        }
    });

    let state = AppState::new(&config, shutdown_rx);
    listener::serve(listener, state).await;

    tracing::info!("all connections closed, exiting");
    Ok(())
}
