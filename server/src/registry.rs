//! Connection registry: the authoritative live set of (connection, username)
//! pairs. Single source of truth for "who is online".
//!
//! The map is only ever touched through [`ConnectionRegistry`]'s methods;
//! sessions insert on join and remove on leave, the broadcast engine removes
//! on write failure. Fanout never does I/O while holding a shard lock; it
//! works from a [`snapshot`](ConnectionRegistry::snapshot) instead.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Error;

/// Opaque identity of one live connection. Ids are minted from a monotonic
/// counter and never reused, so two connections are never equal by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Frame pushed to a connection's writer task.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    /// A complete wire line, delivered verbatim.
    Line(Arc<str>),
    /// Shut the write half down and stop the writer task.
    Close,
}

/// Sender half of a connection's outbound channel. Other parts of the system
/// clone this to push frames to a specific client.
pub type OutboundSender = mpsc::UnboundedSender<OutboundFrame>;

/// Registry entry for one connection.
#[derive(Debug)]
pub struct PeerHandle {
    /// Username established at handshake, immutable for the session.
    pub username: String,
    sender: OutboundSender,
}

impl PeerHandle {
    /// Ask the connection's writer task to shut the stream down. Never
    /// fails: a writer that already died has closed the channel, and an
    /// already-closed stream needs no further closing.
    pub fn close(&self) {
        let _ = self.sender.send(OutboundFrame::Close);
    }
}

/// Point-in-time copy of one registry entry, safe to iterate and write to
/// without holding any registry lock.
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    pub id: ConnectionId,
    pub username: String,
    pub sender: OutboundSender,
}

/// Concurrency-safe connection → username map.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    peers: DashMap<ConnectionId, PeerHandle>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh connection id.
    pub fn issue_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Insert a connection. Fails if the id is already present, which cannot
    /// happen when ids come from [`issue_id`](Self::issue_id).
    pub fn register(
        &self,
        id: ConnectionId,
        username: &str,
        sender: OutboundSender,
    ) -> Result<(), Error> {
        match self.peers.entry(id) {
            Entry::Occupied(_) => Err(Error::DuplicateRegistration(id)),
            Entry::Vacant(slot) => {
                slot.insert(PeerHandle {
                    username: username.to_string(),
                    sender,
                });
                Ok(())
            }
        }
    }

    /// Remove a connection, returning its handle if it was still registered.
    /// Idempotent: the session handler and the broadcast engine may race to
    /// remove the same failed connection, and only one of them gets `Some`.
    pub fn unregister(&self, id: ConnectionId) -> Option<PeerHandle> {
        self.peers.remove(&id).map(|(_, handle)| handle)
    }

    /// Point-in-time copy of all entries, sorted by connection id (join
    /// order). Fanout iterates this copy so a slow peer never stalls the
    /// registry for unrelated joins and leaves.
    pub fn snapshot(&self) -> Vec<PeerSnapshot> {
        let mut peers: Vec<PeerSnapshot> = self
            .peers
            .iter()
            .map(|entry| PeerSnapshot {
                id: *entry.key(),
                username: entry.value().username.clone(),
                sender: entry.value().sender.clone(),
            })
            .collect();
        peers.sort_by_key(|peer| peer.id);
        peers
    }

    /// Close every registered connection and clear the map. Used at process
    /// shutdown so all session handlers observe closure and terminate.
    pub fn close_all(&self) {
        for entry in self.peers.iter() {
            entry.value().close();
        }
        self.peers.clear();
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
