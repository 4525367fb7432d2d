//! # Server Address Pool
//!
//! Turns user-supplied `host[:port]` tokens into the ordered list of servers a
//! client may connect to.
//!
//! Parsing is best effort: a token that is malformed or whose host does not
//! resolve is left out of the pool instead of failing the whole
//! construction. Such tokens are kept in [`AddressPool::rejected`] so that a
//! typo can still be diagnosed. Only a pool with no usable server at all is
//! an error.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};

use log::warn;

use super::error::{NoeqError, Result};

/// Port used when a token has no `:port` suffix.
pub const DEFAULT_PORT: u16 = 4444;

/// A single resolved server endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    host: String,
    port: u16,
    socket_addr: SocketAddr,
}

impl ServerAddress {
    /// Parse and resolve one `host[:port]` token.
    ///
    /// The token is split on the first `:`. When several socket addresses
    /// resolve for the host, the first one is used.
    pub fn parse(token: &str) -> std::result::Result<Self, RejectReason> {
        let token = token.trim();
        if token.is_empty() {
            return Err(RejectReason::Empty);
        }

        let (host, port) = match token.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| RejectReason::InvalidPort(port.to_string()))?;
                (host, port)
            }
            None => (token, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(RejectReason::MissingHost);
        }

        let socket_addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| RejectReason::Unresolved(e.to_string()))?
            .next()
            .ok_or_else(|| RejectReason::Unresolved("no addresses returned".to_string()))?;

        Ok(Self {
            host: host.to_string(),
            port,
            socket_addr,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The resolved address that is dialed.
    pub fn socket_addr(&self) -> SocketAddr {
        self.socket_addr
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Why a token was left out of the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    MissingHost,
    InvalidPort(String),
    Unresolved(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "empty address"),
            RejectReason::MissingHost => write!(f, "missing host"),
            RejectReason::InvalidPort(port) => write!(f, "invalid port '{}'", port),
            RejectReason::Unresolved(reason) => write!(f, "host did not resolve: {}", reason),
        }
    }
}

/// A token that did not make it into the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedAddress {
    pub token: String,
    pub reason: RejectReason,
}

/// Ordered, non-empty, immutable list of candidate servers.
#[derive(Debug, Clone)]
pub struct AddressPool {
    servers: Vec<ServerAddress>,
    rejected: Vec<RejectedAddress>,
}

impl AddressPool {
    /// Build a pool from a comma-separated list such as `"a:4444,b,c:5000"`.
    pub fn parse(list: &str) -> Result<Self> {
        Self::from_tokens(list.split(','))
    }

    /// Build a pool from individual `host[:port]` tokens, keeping input order.
    ///
    /// # Errors
    /// `InvalidConfiguration` when no token yields a usable server.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut servers = Vec::new();
        let mut rejected = Vec::new();

        for token in tokens {
            let token = token.as_ref();
            match ServerAddress::parse(token) {
                Ok(server) => servers.push(server),
                Err(reason) => {
                    warn!("Ignoring server address '{}': {}", token, reason);
                    rejected.push(RejectedAddress {
                        token: token.to_string(),
                        reason,
                    });
                }
            }
        }

        if servers.is_empty() {
            return Err(NoeqError::InvalidConfiguration(format!(
                "no valid server addresses were provided ({} rejected)",
                rejected.len()
            )));
        }

        Ok(Self { servers, rejected })
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Always false for a constructed pool.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Server at `index`, wrapping around the end of the pool.
    pub fn get(&self, index: usize) -> &ServerAddress {
        &self.servers[index % self.servers.len()]
    }

    /// Index of the server after `index`, wrapping to the start.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.servers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServerAddress> {
        self.servers.iter()
    }

    /// Tokens dropped during construction, in input order.
    pub fn rejected(&self) -> &[RejectedAddress] {
        &self.rejected
    }
}
