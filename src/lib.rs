//! Client library for a noeq-style unique id service.
//!
//! See [`IdClient`] for the entry point and [`common::messages`] for the
//! wire protocol.

pub mod client;
pub mod common;

pub use client::{ClientMetrics, IdClient};
pub use common::address::{AddressPool, ServerAddress, DEFAULT_PORT};
pub use common::config::{ClientConfig, ClientOptions};
pub use common::error::{NoeqError, Result};
