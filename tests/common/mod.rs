//! In-process stub id server and test dialers shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use noeq_client::client::Dialer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the stub answers a request for `n` ids.
#[derive(Clone)]
pub enum Mode {
    /// Sequential ids from a shared counter starting at 1
    Counter,
    /// `n * 1000 + i`, so a caller can tell its own batch apart
    Tagged,
    /// The first `n` of these values
    Fixed(Vec<i64>),
    /// Close the connection on the very first request, then behave like `Counter`
    HangUpFirst,
    /// Read requests but never answer
    Silent,
}

#[derive(Default)]
struct Recorded {
    auth_frames: Mutex<Vec<Vec<u8>>>,
    requests: Mutex<Vec<u8>>,
    connections: AtomicUsize,
    counter: AtomicI64,
    hung_up: AtomicBool,
}

pub struct StubServer {
    addr: String,
    recorded: Arc<Recorded>,
}

impl StubServer {
    pub async fn start(mode: Mode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let recorded = Arc::new(Recorded::default());

        let shared = recorded.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                shared.connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, mode.clone(), shared.clone()));
            }
        });

        Self { addr, recorded }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn auth_frames(&self) -> Vec<Vec<u8>> {
        self.recorded.auth_frames.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<u8> {
        self.recorded.requests.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.recorded.connections.load(Ordering::SeqCst)
    }

    /// Connection count once it reaches `expected`, or whatever it is after a
    /// second. The accept loop runs after the client's handshake completes.
    pub async fn wait_for_connections(&self, expected: usize) -> usize {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while self.connections() < expected && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.connections()
    }
}

async fn serve(mut socket: TcpStream, mode: Mode, recorded: Arc<Recorded>) {
    loop {
        let mut first = [0u8; 1];
        if socket.read_exact(&mut first).await.is_err() {
            return;
        }

        if first[0] == 0 {
            let mut len = [0u8; 1];
            if socket.read_exact(&mut len).await.is_err() {
                return;
            }
            let mut token = vec![0u8; len[0] as usize];
            if socket.read_exact(&mut token).await.is_err() {
                return;
            }
            let mut frame = vec![0, len[0]];
            frame.extend_from_slice(&token);
            recorded.auth_frames.lock().unwrap().push(frame);
            continue;
        }

        let n = first[0] as usize;
        recorded.requests.lock().unwrap().push(first[0]);

        let ids: Vec<i64> = match &mode {
            Mode::Counter => next_ids(&recorded, n),
            Mode::Tagged => (0..n as i64).map(|i| n as i64 * 1000 + i).collect(),
            Mode::Fixed(values) => values.iter().copied().cycle().take(n).collect(),
            Mode::HangUpFirst => {
                if !recorded.hung_up.swap(true, Ordering::SeqCst) {
                    return;
                }
                next_ids(&recorded, n)
            }
            Mode::Silent => {
                std::future::pending::<()>().await;
                return;
            }
        };

        let bytes: Vec<u8> = ids.iter().flat_map(|id| id.to_be_bytes()).collect();
        // Split the reply so unsynchronized readers would see partial batches.
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        if socket.write_all(head).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
        if socket.write_all(tail).await.is_err() {
            return;
        }
    }
}

fn next_ids(recorded: &Recorded, n: usize) -> Vec<i64> {
    (0..n)
        .map(|_| recorded.counter.fetch_add(1, Ordering::SeqCst) + 1)
        .collect()
}

/// Dialer that stalls or refuses chosen addresses and dials the rest for real.
#[derive(Clone, Default)]
pub struct FaultyDialer {
    stalled: Arc<HashSet<SocketAddr>>,
    refused: Arc<HashSet<SocketAddr>>,
    attempts: Arc<Mutex<Vec<SocketAddr>>>,
}

impl FaultyDialer {
    pub fn new(stalled: &[&str], refused: &[&str]) -> Self {
        Self {
            stalled: Arc::new(stalled.iter().map(|a| a.parse().unwrap()).collect()),
            refused: Arc::new(refused.iter().map(|a| a.parse().unwrap()).collect()),
            attempts: Arc::default(),
        }
    }

    pub fn attempts(&self) -> Vec<SocketAddr> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Dialer for FaultyDialer {
    fn dial(&self, addr: SocketAddr) -> impl Future<Output = io::Result<TcpStream>> + Send {
        self.attempts.lock().unwrap().push(addr);
        let stalled = self.stalled.contains(&addr);
        let refused = self.refused.contains(&addr);
        async move {
            if stalled {
                std::future::pending::<()>().await;
            }
            if refused {
                return Err(io::ErrorKind::ConnectionRefused.into());
            }
            TcpStream::connect(addr).await
        }
    }
}

/// Address of a port that was just closed, so connecting is refused.
pub async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}
