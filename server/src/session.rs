//! Per-connection session actor.
//!
//! Each accepted socket is split in two: the session task owns the buffered
//! reader and drives the connection's lifecycle (handshake → active →
//! terminated); a spawned writer task owns the write half and drains the
//! connection's outbound channel. Any part of the system can push frames to
//! this client through the sender registered in the connection registry.
//!
//! Failure semantics: no retries anywhere. A read or write failure is
//! terminal for this connection only and never escapes the session.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::broadcast;
use crate::protocol;
use crate::registry::OutboundFrame;
use crate::state::AppState;

/// Drive one connection from accept to termination.
pub async fn run_connection(stream: TcpStream, addr: SocketAddr, state: AppState) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    // Handshake: the first line is the username. Bounded in size and time;
    // a connection that fails here was never registered and is just dropped.
    let username = match timeout(state.handshake_timeout, read_handshake(&mut reader)).await {
        Ok(Ok(Some(username))) => username,
        Ok(Ok(None)) => {
            tracing::debug!(%addr, "empty handshake, dropping connection");
            return;
        }
        Ok(Err(error)) => {
            tracing::debug!(%addr, error = %error, "unreadable handshake, dropping connection");
            return;
        }
        Err(_) => {
            tracing::debug!(%addr, "handshake timed out, dropping connection");
            return;
        }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let id = state.registry.issue_id();
    if let Err(error) = state.registry.register(id, &username, tx) {
        tracing::error!(%addr, error = %error, "failed to register connection");
        return;
    }
    tracing::info!(%id, username = %username, %addr, "client joined");

    let writer = tokio::spawn(writer_task(write_half, rx, state.write_timeout));
    broadcast::broadcast_line(&state.registry, &protocol::join_notice(&username), Some(id));

    let mut lines = reader.lines();
    let mut shutdown = state.shutdown.clone();
    let mut stopped_by_shutdown = false;

    loop {
        tokio::select! {
            // next_line is cancellation safe: losing the race to the
            // shutdown branch cannot lose a partially read line.
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    broadcast::broadcast_line(
                        &state.registry,
                        &protocol::chat_line(&username, text),
                        Some(id),
                    );
                }
                Ok(None) => {
                    tracing::debug!(%id, username = %username, "peer closed connection");
                    break;
                }
                Err(error) => {
                    tracing::debug!(%id, username = %username, error = %error, "read failed");
                    break;
                }
            },
            _ = shutdown.wait_for(|&stop| stop) => {
                stopped_by_shutdown = true;
                break;
            }
        }
    }

    writer.abort();

    // The broadcast engine may already have evicted us on a write failure;
    // only the winner of the unregister race announces the departure. During
    // process shutdown everyone is leaving at once, so no notices then.
    if state.registry.unregister(id).is_some() {
        if !stopped_by_shutdown {
            broadcast::broadcast_line(&state.registry, &protocol::departure_notice(&username), None);
        }
        tracing::info!(%id, username = %username, %addr, "client left");
    }
}

/// Read the handshake line: at most [`protocol::MAX_HANDSHAKE_BYTES`],
/// trimmed. `None` means the peer sent nothing usable (EOF or only
/// whitespace) and must not be registered.
async fn read_handshake<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut limited = (&mut *reader).take(protocol::MAX_HANDSHAKE_BYTES);
    let mut line = String::new();
    let read = limited.read_line(&mut line).await?;
    if read == 0 {
        return Ok(None);
    }
    let username = line.trim();
    if username.is_empty() {
        Ok(None)
    } else {
        Ok(Some(username.to_string()))
    }
}

/// Writer task: drains the connection's outbound channel into the socket.
///
/// Every write is bounded by `write_timeout` so a hung peer detaches here
/// instead of stalling broadcasts. Exiting drops the receiver, which is how
/// the broadcast engine learns this peer is gone.
async fn writer_task<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<OutboundFrame>,
    write_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        match frame {
            OutboundFrame::Line(line) => {
                match timeout(write_timeout, writer.write_all(line.as_bytes())).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        tracing::debug!(error = %error, "peer write failed");
                        break;
                    }
                    Err(_) => {
                        tracing::debug!(timeout_secs = write_timeout.as_secs(), "peer write timed out");
                        break;
                    }
                }
            }
            OutboundFrame::Close => {
                let _ = writer.shutdown().await;
                break;
            }
        }
    }
}
