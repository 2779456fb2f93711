//! Broadcast engine: fan one wire line out to every registered connection,
//! evicting peers whose writer has died.
//!
//! Fanout works on a registry snapshot and only enqueues frames on each
//! peer's channel; the per-peer socket write (and its timeout) happens in
//! that peer's writer task. A send error means the writer task is gone, so
//! the peer is unregistered, its stream closed, and its departure announced
//! to the survivors. Errors never propagate to the caller: one dead peer
//! must not prevent delivery to the rest.

use std::sync::Arc;

use crate::protocol;
use crate::registry::{ConnectionId, ConnectionRegistry, OutboundFrame, PeerHandle};

/// Deliver `line` to every registered connection except `exclude`.
///
/// Peers that fail mid-fanout are evicted exactly once (the idempotent
/// `unregister` is the gate against a racing session-handler cleanup) and a
/// departure notice for each is broadcast to the remaining peers. The
/// notice pass repeats until a sweep completes with no new failures, which
/// terminates because the registry only shrinks.
pub fn broadcast_line(registry: &ConnectionRegistry, line: &str, exclude: Option<ConnectionId>) {
    let mut evicted = sweep(registry, line, exclude);
    while !evicted.is_empty() {
        let mut next = Vec::new();
        for peer in &evicted {
            next.extend(sweep(registry, &protocol::departure_notice(&peer.username), None));
        }
        evicted = next;
    }
}

/// One fanout pass. Returns the peers evicted during this pass.
fn sweep(
    registry: &ConnectionRegistry,
    line: &str,
    exclude: Option<ConnectionId>,
) -> Vec<PeerHandle> {
    let payload: Arc<str> = Arc::from(line);
    let mut failed = Vec::new();

    for peer in registry.snapshot() {
        if exclude == Some(peer.id) {
            continue;
        }
        if peer.sender.send(OutboundFrame::Line(payload.clone())).is_err() {
            failed.push(peer.id);
        }
    }

    let mut evicted = Vec::new();
    for id in failed {
        // Whoever wins the unregister race owns the close and the notice.
        if let Some(handle) = registry.unregister(id) {
            tracing::warn!(%id, username = %handle.username, "evicting unreachable peer");
            handle.close();
            evicted.push(handle);
        }
    }
    evicted
}
