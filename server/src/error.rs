//! Error types for the chat server.
//!
//! Only startup-time failures propagate: a connection-level read or write
//! failure is terminal for that connection alone and is handled where it
//! occurs (see `session` and `broadcast`).

use std::net::SocketAddr;
use thiserror::Error;

use crate::registry::ConnectionId;

#[derive(Debug, Error)]
pub enum Error {
    /// The listening socket could not be acquired. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A connection id was registered twice. Ids are never reused, so this
    /// indicates a bug in the session lifecycle.
    #[error("connection {0} already registered")]
    DuplicateRegistration(ConnectionId),
}

pub type Result<T> = std::result::Result<T, Error>;
