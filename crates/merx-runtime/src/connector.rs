//! The connector contract.
//!
//! A connector is a long-lived, platform-bound integration. It maps actions to
//! its platform's protocol, owns its own credentials, and supplies a
//! non-destructive fallback when no live credential is configured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use merx_core::{
    Action, ActionErrorKind, ActionResult, ActionType, ConnectorConfig, ConnectorMode, Platform,
};
use serde::Serialize;
use thiserror::Error;

/// A platform integration failed for one action.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("connector for {0} is not initialized")]
    NotInitialized(Platform),

    #[error("{platform} connector does not support {action}")]
    Unsupported { platform: Platform, action: ActionType },

    /// The idempotency key was already used for a different action.
    #[error("idempotency key reuse: '{key}' was first used for a different action on {platform}")]
    IdempotencyKeyReuse { platform: Platform, key: String },

    #[error("invalid connector configuration: {0}")]
    Configuration(String),

    /// The platform answered with an error.
    #[error("platform request failed: {0}")]
    Request(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Descriptive information about a registered connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorMetadata {
    pub name: String,
    pub version: String,
    pub platform: Platform,
    pub capabilities: Vec<ActionType>,
    /// Whether the connector talks to the real backend.
    pub mode: ConnectorMode,
    /// Whether `execute_actions` handles a whole group in one call.
    pub batch_execution: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: None,
            checked_at: Utc::now(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
            checked_at: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn platform(&self) -> Platform;

    /// Apply configuration. Called once, before the connector is registered.
    async fn initialize(&mut self, config: &ConnectorConfig) -> Result<(), ConnectorError>;

    async fn health_check(&self) -> HealthStatus;

    fn supports_action(&self, action_type: ActionType) -> bool;

    async fn execute_action(&self, action: &Action) -> Result<ActionResult, ConnectorError>;

    /// Execute a platform group, one result per action in order.
    ///
    /// The default runs `execute_action` sequentially and turns errors into
    /// failed results. The engine only calls this when
    /// [`ConnectorMetadata::batch_execution`] is set.
    async fn execute_actions(&self, actions: &[Action]) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            let result = match self.execute_action(action).await {
                Ok(result) => result,
                Err(err) => {
                    ActionResult::failure(action, ActionErrorKind::Connector, err.to_string())
                }
            };
            results.push(result);
        }
        results
    }

    fn metadata(&self) -> ConnectorMetadata;
}
