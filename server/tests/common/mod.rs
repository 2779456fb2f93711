//! Shared helpers for the integration tests: an in-process server on an
//! ephemeral port and a line-oriented test client speaking the raw TCP
//! protocol (username line first, then newline-delimited messages).

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;

use parley_server::registry::ConnectionRegistry;
use parley_server::state::AppState;

/// How long to wait for a line that is expected to arrive.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);
/// How long a stream must stay quiet before we call it drained.
pub const SILENCE_WINDOW: Duration = Duration::from_millis(300);

/// Start the server on an ephemeral port. Returns the address, the shutdown
/// trigger, and the registry for white-box assertions.
pub async fn start_test_server() -> (SocketAddr, watch::Sender<bool>, Arc<ConnectionRegistry>) {
    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState {
        registry: Arc::new(ConnectionRegistry::new()),
        handshake_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(5),
        shutdown: shutdown_rx,
    };
    let registry = state.registry.clone();
    tokio::spawn(parley_server::listener::serve(socket, state));
    (addr, shutdown_tx, registry)
}

/// A chat client over a raw TCP stream.
pub struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

/// Connect and perform the username handshake.
pub async fn connect(addr: SocketAddr, username: &str) -> TestClient {
    let stream = TcpStream::connect(addr).await.unwrap();
    client_from(stream, username).await
}

/// Like [`connect`], but with `SO_LINGER` set to zero so dropping the client
/// resets the connection instead of closing it gracefully.
pub async fn connect_abrupt(addr: SocketAddr, username: &str) -> TestClient {
    let stream = TcpStream::connect(addr).await.unwrap();
    stream.set_linger(Some(Duration::from_secs(0))).unwrap();
    client_from(stream, username).await
}

async fn client_from(stream: TcpStream, username: &str) -> TestClient {
    let (read_half, mut writer) = stream.into_split();
    writer
        .write_all(format!("{username}\n").as_bytes())
        .await
        .unwrap();
    TestClient {
        lines: BufReader::new(read_half).lines(),
        writer,
    }
}

impl TestClient {
    /// Send one newline-terminated message.
    pub async fn send(&mut self, text: &str) {
        self.writer
            .write_all(format!("{text}\n").as_bytes())
            .await
            .unwrap();
    }

    /// Next line within [`RECV_TIMEOUT`]; `None` on timeout or EOF.
    pub async fn recv(&mut self) -> Option<String> {
        match timeout(RECV_TIMEOUT, self.lines.next_line()).await {
            Ok(Ok(Some(line))) => Some(line),
            _ => None,
        }
    }

    /// Read lines until one satisfies `pred`, discarding the rest. Panics if
    /// the stream goes quiet first.
    pub async fn recv_until(&mut self, pred: impl Fn(&str) -> bool) -> String {
        loop {
            match self.recv().await {
                Some(line) if pred(&line) => return line,
                Some(_) => continue,
                None => panic!("connection went quiet before the expected line arrived"),
            }
        }
    }

    /// Collect every line that arrives before the stream stays quiet for a
    /// full [`SILENCE_WINDOW`].
    pub async fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            match timeout(SILENCE_WINDOW, self.lines.next_line()).await {
                Ok(Ok(Some(line))) => lines.push(line),
                _ => return lines,
            }
        }
    }

    /// True if the server ended this connection within [`RECV_TIMEOUT`].
    pub async fn closed(&mut self) -> bool {
        matches!(
            timeout(RECV_TIMEOUT, self.lines.next_line()).await,
            Ok(Ok(None)) | Ok(Err(_))
        )
    }
}

/// Poll `cond` until it holds or [`RECV_TIMEOUT`] elapses.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met in time");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
