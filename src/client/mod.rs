//! # Client Components
//!
//! ## Id Client ([`client`])
//! The facade callers use: serializes requests, drives the connection and
//! owns the drop-on-error recovery policy.
//!
//! ## Connection Manager ([`connection`])
//! Owns the socket: random server pick, failover on connect timeout, the
//! auth handshake and teardown.
//!
//! ## Metrics ([`metrics`])
//! Latency and failure recording for tooling built on the client.

pub mod client;
pub mod connection;
pub mod metrics;

// Re-export for convenience
pub use client::IdClient;
pub use connection::{ConnectionManager, ConnectionState, Dialer, TcpDialer};
pub use metrics::ClientMetrics;
