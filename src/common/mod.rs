//! # Common Components
//!
//! Building blocks shared by the client and its tooling.
//!
//! ## Modules
//!
//! - [`address`]: `host[:port]` parsing and the immutable server pool
//! - [`messages`]: wire protocol encoding and decoding
//! - [`config`]: TOML configuration and client options
//! - [`error`]: the library error type

pub mod address;
pub mod config;
pub mod error;
pub mod messages;
