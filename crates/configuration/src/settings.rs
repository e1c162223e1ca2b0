use serde::Deserialize;
use std::time::Duration;

/// The root configuration structure for the entire application.
///
/// Every field carries a sensible default so the service can start with no
/// `config.toml` present at all; the file and `ROWSTREAM_*` environment
/// variables only override.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub atomic: AtomicSettings,
}

/// Settings for the HTTP listener and its response-object pool.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// The address the HTTP listener binds to (e.g., "0.0.0.0:3000").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Upper bound on recycled response records kept between requests.
    #[serde(default = "default_response_pool_capacity")]
    pub response_pool_capacity: usize,
}

/// Settings for the atomic multi-statement write path.
#[derive(Debug, Clone, Deserialize)]
pub struct AtomicSettings {
    /// Artificial pause between the insert and update statements, in
    /// milliseconds. Exists to widen the cancellation window.
    #[serde(default = "default_write_delay_ms")]
    pub write_delay_ms: u64,
    /// Budget for the whole operation; once elapsed the cancellation token is
    /// raised and the transaction is rolled back.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}
fn default_response_pool_capacity() -> usize {
    64
}
fn default_write_delay_ms() -> u64 {
    2_000
}
fn default_operation_timeout_ms() -> u64 {
    10_000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            response_pool_capacity: default_response_pool_capacity(),
        }
    }
}

impl Default for AtomicSettings {
    fn default() -> Self {
        Self {
            write_delay_ms: default_write_delay_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

impl AtomicSettings {
    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}
