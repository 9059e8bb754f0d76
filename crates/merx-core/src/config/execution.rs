//! Execution engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How platform groups are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One platform group after another.
    #[default]
    Sequential,
    /// All platform groups at once; actions within a group stay in order.
    Concurrent,
}

/// Settings for the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Overall budget for executing one plan, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How long a successful keyed result is replayed, in seconds.
    #[serde(default = "default_idempotency_ttl_secs")]
    pub idempotency_ttl_secs: u64,
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_ttl_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            timeout_ms: default_timeout_ms(),
            idempotency_ttl_secs: default_idempotency_ttl_secs(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_idempotency_ttl_secs() -> u64 {
    24 * 60 * 60
}
