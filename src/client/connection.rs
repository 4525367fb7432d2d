//! # Connection Manager
//!
//! Owns the one socket a client may hold and everything about its lifecycle:
//!
//! - **Server selection**: a uniformly random start index into the pool
//! - **Failover**: on a connect *timeout* the next server in pool order is
//!   tried (wrapping), up to `min(max_attempts, pool size)` attempts
//! - **Fast fail**: any other connect error (refused, unreachable) surfaces
//!   immediately without consuming an attempt on another server
//! - **Authentication**: the auth frame is written once right after connect
//!   when a token is configured
//! - **Teardown**: both halves are shut down independently, then the socket
//!   is closed
//!
//! A fresh random start is drawn on every connect; failed servers are not
//! remembered between calls.

use std::future::Future;
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::common::address::{AddressPool, ServerAddress};
use crate::common::config::ClientOptions;
use crate::common::error::{NoeqError, Result};
use crate::common::messages::encode_auth_frame;

/// Opens a TCP stream to one resolved server address.
///
/// The connect timeout is applied by the caller; a dialer only has to
/// establish the stream.
pub trait Dialer: Send + Sync + 'static {
    fn dial(&self, addr: SocketAddr) -> impl Future<Output = io::Result<TcpStream>> + Send;
}

/// Plain TCP dialer used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn dial(&self, addr: SocketAddr) -> impl Future<Output = io::Result<TcpStream>> + Send {
        TcpStream::connect(addr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

pub struct ConnectionManager<D = TcpDialer> {
    pool: AddressPool,
    auth_frame: Option<Vec<u8>>,
    options: ClientOptions,
    dialer: D,
    state: ConnectionState,
    stream: Option<TcpStream>,
    current: Option<usize>,
    /// Set while an auth frame or request is on the wire; still set on entry
    /// means the previous write was abandoned and the stream is out of sync.
    exchange_pending: bool,
}

impl<D: Dialer> ConnectionManager<D> {
    /// Create a disconnected manager.
    ///
    /// # Errors
    /// `InvalidConfiguration` when the token is longer than 255 bytes.
    pub fn new(pool: AddressPool, token: &[u8], options: ClientOptions, dialer: D) -> Result<Self> {
        let auth_frame = if token.is_empty() {
            None
        } else {
            Some(encode_auth_frame(token)?)
        };

        Ok(Self {
            pool,
            auth_frame,
            options,
            dialer,
            state: ConnectionState::Disconnected,
            stream: None,
            current: None,
            exchange_pending: false,
        })
    }

    pub fn pool(&self) -> &AddressPool {
        &self.pool
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reflects the connection state only; the socket is not checked for liveness.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// The server of the live connection, if any.
    pub fn connected_to(&self) -> Option<&ServerAddress> {
        self.current
            .filter(|_| self.is_connected())
            .map(|index| self.pool.get(index))
    }

    /// Connect to a random server in the pool unless already connected.
    pub async fn ensure_connected(&mut self) -> Result<()> {
        if self.exchange_pending {
            warn!("Previous request was abandoned mid-exchange, dropping connection");
            if let Err(e) = self.disconnect() {
                debug!("Ignoring close error on abandoned connection: {}", e);
            }
        }

        if self.is_connected() {
            return Ok(());
        }

        let start = rand::thread_rng().gen_range(0..self.pool.len());
        self.connect_from(start).await
    }

    /// Connect starting at pool index `start`, failing over on timeouts.
    pub(crate) async fn connect_from(&mut self, start: usize) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let attempts = self.options.max_attempts.min(self.pool.len());
        let mut remaining = attempts;
        let mut index = start % self.pool.len();
        self.state = ConnectionState::Connecting;

        loop {
            let server = self.pool.get(index).clone();
            debug!(
                "Connecting to {} (attempt {}/{})",
                server,
                attempts - remaining + 1,
                attempts
            );

            match dial_with_timeout(&self.dialer, server.socket_addr(), self.options.connect_timeout).await {
                Ok(stream) => {
                    self.stream = Some(stream);
                    self.current = Some(index);
                    self.state = ConnectionState::Connected;
                    info!("Connected to id server {}", server);
                    return self.authenticate(&server).await;
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    remaining -= 1;
                    if remaining == 0 {
                        self.state = ConnectionState::Disconnected;
                        warn!(
                            "Giving up after {} connection timeout(s), last server {}",
                            attempts, server
                        );
                        return Err(NoeqError::ConnectionExhausted {
                            attempts,
                            source: e,
                        });
                    }
                    warn!("Connection to {} timed out, trying next server", server);
                    index = self.pool.next_index(index);
                }
                Err(e) => {
                    self.state = ConnectionState::Disconnected;
                    warn!("Connection to {} failed: {}", server, e);
                    return Err(NoeqError::ConnectionFailed {
                        addr: server.to_string(),
                        source: e,
                    });
                }
            }
        }
    }

    async fn authenticate(&mut self, server: &ServerAddress) -> Result<()> {
        let (Some(frame), Some(stream)) = (self.auth_frame.as_deref(), self.stream.as_mut()) else {
            return Ok(());
        };

        // A partial frame left behind by a dropped future desyncs the stream.
        self.exchange_pending = true;
        let written = match stream.write_all(frame).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => {
                self.exchange_pending = false;
                debug!("Sent auth frame to {}", server);
                Ok(())
            }
            Err(e) => {
                if let Err(close_err) = self.disconnect() {
                    debug!("Ignoring close error after failed auth: {}", close_err);
                }
                Err(NoeqError::ConnectionFailed {
                    addr: server.to_string(),
                    source: e,
                })
            }
        }
    }

    /// Write `request` and read exactly `response_len` bytes back.
    ///
    /// Failures are returned raw; recovery is the caller's decision.
    pub(crate) async fn exchange(&mut self, request: &[u8], response_len: usize) -> io::Result<Vec<u8>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;

        self.exchange_pending = true;
        stream.write_all(request).await?;
        stream.flush().await?;

        let mut response = vec![0u8; response_len];
        stream.read_exact(&mut response).await?;
        self.exchange_pending = false;

        Ok(response)
    }

    /// Shut down both directions and close the socket.
    ///
    /// A failed half-close is ignored so the other half and the close still
    /// run. The close error, if the platform reports one, is returned. No-op
    /// when disconnected.
    pub fn disconnect(&mut self) -> Result<()> {
        self.state = ConnectionState::Disconnected;
        self.exchange_pending = false;
        let server = self.current.take().map(|index| self.pool.get(index).to_string());

        let Some(stream) = self.stream.take() else {
            return Ok(());
        };

        let stream = stream.into_std()?;
        if let Err(e) = stream.shutdown(Shutdown::Read) {
            debug!("Input shutdown failed: {}", e);
        }
        if let Err(e) = stream.shutdown(Shutdown::Write) {
            debug!("Output shutdown failed: {}", e);
        }
        drop(stream);

        info!(
            "Disconnected from id server {}",
            server.as_deref().unwrap_or("<unknown>")
        );
        Ok(())
    }
}

/// Dial `addr`, mapping an elapsed deadline onto `ErrorKind::TimedOut`.
async fn dial_with_timeout<D: Dialer>(dialer: &D, addr: SocketAddr, limit: Duration) -> io::Result<TcpStream> {
    match tokio::time::timeout(limit, dialer.dial(addr)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect to {} timed out after {:?}", addr, limit),
        )),
    }
}
