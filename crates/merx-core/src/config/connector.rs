//! Connector configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Whether a connector talks to the real platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorMode {
    /// Calls the platform's API.
    Live,
    /// Deterministic, non-destructive synthetic responses.
    #[default]
    Fallback,
}

/// Per-platform connector settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default)]
    pub mode: ConnectorMode,

    /// Environment variable holding the platform credential.
    #[serde(default)]
    pub credentials_env: Option<String>,

    /// Connector-specific settings, passed through untouched.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl ConnectorConfig {
    /// Read the credential from the environment, if configured and set.
    pub fn credential(&self) -> Option<String> {
        self.credentials_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|value| !value.is_empty())
    }
}
