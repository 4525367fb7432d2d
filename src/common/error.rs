//! # Error Types
//!
//! Every fallible library operation returns [`NoeqError`]. The variants map
//! one-to-one onto the failure classes a caller has to tell apart: a client
//! that could never work, a pool that is currently unreachable, a single
//! server that refused us, and a request that broke mid-exchange.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NoeqError {
    /// The client cannot be built: no usable server or an oversized token.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Every permitted connection attempt timed out.
    #[error("Connection attempts exhausted after {attempts} timeout(s)")]
    ConnectionExhausted {
        attempts: usize,
        #[source]
        source: io::Error,
    },

    /// A non-timeout failure while connecting or authenticating.
    #[error("Connection to {addr} failed: {source}")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The request write or response read failed; the connection was dropped.
    #[error("Request failed: {0}")]
    RequestFailed(#[source] io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl NoeqError {
    /// Short stable label, used to group failures in metrics.
    pub fn category(&self) -> &'static str {
        match self {
            NoeqError::InvalidConfiguration(_) => "invalid_configuration",
            NoeqError::ConnectionExhausted { .. } => "connection_exhausted",
            NoeqError::ConnectionFailed { .. } => "connection_failed",
            NoeqError::Protocol(_) => "protocol",
            NoeqError::RequestFailed(_) => "request_failed",
            NoeqError::InvalidArgument(_) => "invalid_argument",
            NoeqError::Io(_) => "io",
        }
    }

    /// True for failures that leave the client usable on a later call.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NoeqError::ConnectionExhausted { .. }
                | NoeqError::ConnectionFailed { .. }
                | NoeqError::RequestFailed(_)
                | NoeqError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, NoeqError>;
