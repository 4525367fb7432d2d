//! # Configuration
//!
//! TOML configuration for building an [`IdClient`](crate::client::IdClient)
//! from a file, and the runtime [`ClientOptions`] it resolves to.
//!
//! ## Example TOML
//!
//! ```toml
//! [client]
//! token = "secret"
//! servers = ["10.0.0.1:4444", "10.0.0.2"]
//! connect_timeout_ms = 250
//! max_attempts = 4
//! request_timeout_ms = 1000
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Per-attempt connect timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

/// Upper bound on connection attempts per connect; the pool size caps it further.
pub const DEFAULT_MAX_ATTEMPTS: usize = 4;

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Example
/// ```ignore
/// let config: ClientConfig = load_config("config/client.toml")?;
/// ```
pub fn load_config<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: T = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Top-level configuration file layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client: ClientSection,
}

/// The `[client]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientSection {
    /// Authentication token; absent or empty disables the auth frame
    #[serde(default)]
    pub token: Option<String>,
    /// `host[:port]` entries, default port 4444
    pub servers: Vec<String>,
    /// Per-attempt connect timeout in milliseconds (0 = default)
    #[serde(default)]
    pub connect_timeout_ms: u64,
    /// Maximum connect attempts before giving up (0 = default)
    #[serde(default)]
    pub max_attempts: usize,
    /// Bound on one request/response exchange; unset means wait forever
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl ClientConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        load_config(path)
    }

    pub fn options(&self) -> ClientOptions {
        ClientOptions::default()
            .with_connect_timeout(Duration::from_millis(self.client.connect_timeout_ms))
            .with_max_attempts(self.client.max_attempts)
            .with_request_timeout(self.client.request_timeout_ms.map(Duration::from_millis))
    }
}

/// Connection tuning knobs for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub max_attempts: usize,
    pub request_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout: None,
        }
    }
}

impl ClientOptions {
    /// A zero timeout falls back to [`DEFAULT_CONNECT_TIMEOUT`].
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = if timeout.is_zero() {
            DEFAULT_CONNECT_TIMEOUT
        } else {
            timeout
        };
        self
    }

    /// Zero falls back to [`DEFAULT_MAX_ATTEMPTS`].
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = if attempts == 0 {
            DEFAULT_MAX_ATTEMPTS
        } else {
            attempts
        };
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout.filter(|t| !t.is_zero());
        self
    }
}
