//! TCP acceptor: binds the listening socket and spawns one session task per
//! accepted connection, indefinitely.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket};

use crate::error::{Error, Result};
use crate::session;
use crate::state::AppState;

/// Accept backlog passed to `listen`.
const BACKLOG: u32 = 1024;

/// Bind the listening socket with address reuse enabled. A failure here is
/// fatal at startup.
pub fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let bind_err = |source: std::io::Error| Error::Bind { addr, source };

    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(bind_err)?;
    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    socket.listen(BACKLOG).map_err(bind_err)
}

/// Accept loop. Every connection gets its own independent session task: no
/// worker pool, no admission limit; the file-descriptor and task ceiling is
/// a known limit of this design.
///
/// Returns once the shutdown signal flips, after closing every registered
/// connection so the remaining sessions terminate on their own.
pub async fn serve(listener: TcpListener, state: AppState) {
    let mut shutdown = state.shutdown.clone();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    tracing::debug!(%addr, "accepted connection");
                    let state = state.clone();
                    tokio::spawn(session::run_connection(stream, addr, state));
                }
                // One failed accept must not take the server down.
                Err(error) => {
                    tracing::warn!(error = %error, "failed to accept connection");
                }
            },
            _ = shutdown.wait_for(|&stop| stop) => {
                tracing::info!(
                    connections = state.registry.len(),
                    "shutdown requested, closing all connections"
                );
                state.registry.close_all();
                break;
            }
        }
    }
}
