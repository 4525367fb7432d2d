//! # Id Client
//!
//! The public entry point of the library. An [`IdClient`] is shared between
//! tasks (typically behind an `Arc`) and hands out batches of 64-bit ids.
//!
//! ## Request lifecycle
//!
//! Every [`IdClient::get_ids`] call runs as one critical section:
//!
//! 1. make sure a connection exists (random server, failover on timeout)
//! 2. write the one-byte request and flush
//! 3. read exactly `8 * n` bytes and decode them
//!
//! If step 2 or 3 fails the connection is dropped and the call reports
//! `RequestFailed`. Nothing is retried inside the call; the next call
//! reconnects from a fresh random server.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use noeq_client::IdClient;
//!
//! # async fn run() -> noeq_client::Result<()> {
//! let client = IdClient::new(Some("secret"), "10.0.0.1:4444,10.0.0.2")?;
//! let ids = client.get_ids(10).await?;
//! let one = client.get_one_id().await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::Mutex;

use super::connection::{ConnectionManager, Dialer, TcpDialer};
use crate::common::address::{AddressPool, ServerAddress};
use crate::common::config::{ClientConfig, ClientOptions};
use crate::common::error::{NoeqError, Result};
use crate::common::messages::{decode_response, encode_request, response_len, MAX_IDS_PER_REQUEST};

/// Thread-safe client for an id generation service.
pub struct IdClient<D = TcpDialer> {
    pool: AddressPool,
    request_timeout: Option<Duration>,
    connection: Mutex<ConnectionManager<D>>,
}

impl IdClient {
    /// Create a client for a comma-separated server list with default options.
    ///
    /// An absent or empty token disables authentication.
    pub fn new(token: Option<&str>, addresses: &str) -> Result<Self> {
        Self::with_options(token, AddressPool::parse(addresses)?, ClientOptions::default())
    }

    /// Create a client for individual `host[:port]` entries with default options.
    pub fn with_addresses<I, S>(token: Option<&str>, addresses: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_options(token, AddressPool::from_tokens(addresses)?, ClientOptions::default())
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::with_options(
            config.client.token.as_deref(),
            AddressPool::from_tokens(&config.client.servers)?,
            config.options(),
        )
    }

    pub fn with_options(token: Option<&str>, pool: AddressPool, options: ClientOptions) -> Result<Self> {
        Self::with_dialer(token, pool, options, TcpDialer)
    }
}

impl<D: Dialer> IdClient<D> {
    /// Create a client that opens its connections through `dialer`.
    ///
    /// # Errors
    /// `InvalidConfiguration` when the token exceeds 255 bytes.
    pub fn with_dialer(token: Option<&str>, pool: AddressPool, options: ClientOptions, dialer: D) -> Result<Self> {
        let token = token.unwrap_or_default().as_bytes();
        let manager = ConnectionManager::new(pool.clone(), token, options, dialer)?;

        Ok(Self {
            pool,
            request_timeout: options.request_timeout,
            connection: Mutex::new(manager),
        })
    }

    /// The servers this client may connect to, including rejected tokens.
    pub fn pool(&self) -> &AddressPool {
        &self.pool
    }

    /// Connect now instead of on the first request. No-op when connected.
    pub async fn connect(&self) -> Result<()> {
        self.connection.lock().await.ensure_connected().await
    }

    /// Close the current connection, if any.
    pub async fn disconnect(&self) -> Result<()> {
        self.connection.lock().await.disconnect()
    }

    /// Whether a connection is established. Waits for an in-flight request.
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_connected()
    }

    /// The server currently connected to.
    pub async fn connected_server(&self) -> Option<ServerAddress> {
        self.connection.lock().await.connected_to().cloned()
    }

    /// Fetch `n` ids in one request.
    ///
    /// Values below 1 are treated as 1.
    ///
    /// # Errors
    /// - `InvalidArgument` for `n > 255`, before any I/O
    /// - connection errors from establishing the connection
    /// - `RequestFailed` when the exchange breaks; the connection is dropped
    pub async fn get_ids(&self, n: i32) -> Result<Vec<i64>> {
        let count = batch_size(n)?;

        let mut connection = self.connection.lock().await;
        connection.ensure_connected().await?;

        let request = encode_request(count);
        let expected = response_len(count as usize);
        let result = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, connection.exchange(&request, expected))
                .await
                .unwrap_or_else(|_| {
                    Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no response within {:?}", limit),
                    ))
                }),
            None => connection.exchange(&request, expected).await,
        };

        match result {
            Ok(bytes) => {
                debug!("Received {} ids", count);
                decode_response(count as usize, &bytes)
            }
            Err(e) => {
                warn!("Request for {} ids failed: {}", count, e);
                if let Err(close_err) = connection.disconnect() {
                    debug!("Ignoring close error after failed request: {}", close_err);
                }
                Err(NoeqError::RequestFailed(e))
            }
        }
    }

    /// Fetch a single id.
    pub async fn get_one_id(&self) -> Result<i64> {
        self.get_ids(1)
            .await?
            .first()
            .copied()
            .ok_or_else(|| NoeqError::Protocol("empty id batch".to_string()))
    }
}

/// Clamp a requested batch size into the one-byte request field.
fn batch_size(n: i32) -> Result<u8> {
    if n < 1 {
        return Ok(1);
    }
    u8::try_from(n).map_err(|_| {
        NoeqError::InvalidArgument(format!(
            "requested {} ids, at most {} per request",
            n, MAX_IDS_PER_REQUEST
        ))
    })
}
