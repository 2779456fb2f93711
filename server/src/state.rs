//! Shared application state, cloned into every session task.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::Config;
use crate::registry::ConnectionRegistry;

/// Everything a session needs: the connection registry (the only shared
/// mutable state in the server), the connection timeouts, and the process
/// shutdown signal.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live connection → username map.
    pub registry: Arc<ConnectionRegistry>,
    /// Bound on reading the username line of a new connection.
    pub handshake_timeout: Duration,
    /// Bound on each outbound socket write; a peer that exceeds it is
    /// detached instead of stalling broadcasts.
    pub write_timeout: Duration,
    /// Flips to `true` exactly once, when the process is asked to stop.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(config: &Config, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            handshake_timeout: Duration::from_secs(config.handshake_timeout_secs),
            write_timeout: Duration::from_secs(config.write_timeout_secs),
            shutdown,
        }
    }
}
