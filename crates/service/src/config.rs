//! Ledger writer configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the chain-tail critical section
///
/// Holds no policy version: every write names its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Longest wait for a ledger's tail lock before `LOCK_TIMEOUT`
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Extra attempts after losing a chain race (`prev_hash` conflict or busy
    /// database) before `CHAIN_WRITE_CONFLICT`
    #[serde(default = "default_max_write_retries")]
    pub max_write_retries: u32,

    /// Base backoff between attempts, multiplied by the attempt number
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    2_000
}

fn default_max_write_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    25
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            max_write_retries: default_max_write_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}
