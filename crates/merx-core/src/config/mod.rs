//! Configuration types for Merx.
//!
//! A single YAML file (`merx.yaml`) configures every crate. All sections are
//! optional; an empty file yields the defaults.
//!
//! ```yaml
//! planner:
//!   default_platform: whop
//!   default_constraints:
//!     maxActions: 20
//! policy:
//!   forbidden_combinations:
//!     - name: cancel_and_grant
//!       first: cancel_subscription
//!       second: grant_access
//!       target_keys: []
//! execution:
//!   mode: concurrent
//!   timeout_ms: 10000
//!   idempotency_ttl_secs: 3600
//! connectors:
//!   whop:
//!     mode: fallback
//!   stripe:
//!     mode: live
//!     credentials_env: STRIPE_API_KEY
//! ```

pub mod connector;
pub mod execution;
pub mod planner;
pub mod policy;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::action::Platform;

pub use connector::{ConnectorConfig, ConnectorMode};
pub use execution::{ExecutionConfig, ExecutionMode};
pub use planner::PlannerConfig;
pub use policy::{ForbiddenCombinationConfig, PolicyConfig};

/// Complete Merx configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MerxConfig {
    /// Compiler and planner settings.
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Policy gate settings.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Execution engine settings.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Connector settings per platform. Platforms listed here get a connector
    /// registered at startup.
    #[serde(default)]
    pub connectors: BTreeMap<Platform, ConnectorConfig>,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MerxConfig {
    /// Load configuration from a YAML file and check it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content and check it.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.timeout_ms == 0 {
            return Err(ConfigError::Config(
                "execution.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.execution.idempotency_ttl_secs == 0 {
            return Err(ConfigError::Config(
                "execution.idempotency_ttl_secs must be greater than zero".to_string(),
            ));
        }

        let defaults = &self.planner.default_constraints;
        if defaults.max_actions == Some(0) {
            return Err(ConfigError::Config(
                "planner.default_constraints.maxActions must be greater than zero".to_string(),
            ));
        }
        if !defaults.allows(self.planner.default_platform) {
            return Err(ConfigError::Config(format!(
                "planner.default_platform '{}' is not in planner.default_constraints.allowedPlatforms",
                self.planner.default_platform
            )));
        }

        let mut names = HashSet::new();
        for rule in &self.policy.forbidden_combinations {
            rule.validate().map_err(ConfigError::Config)?;
            if !names.insert(rule.name.as_str()) {
                return Err(ConfigError::Config(format!(
                    "policy.forbidden_combinations: duplicate rule name '{}'",
                    rule.name
                )));
            }
        }

        for (platform, connector) in &self.connectors {
            if connector.mode == ConnectorMode::Live && connector.credentials_env.is_none() {
                return Err(ConfigError::Config(format!(
                    "connectors.{}: live mode requires credentials_env",
                    platform
                )));
            }
        }

        Ok(())
    }
}
