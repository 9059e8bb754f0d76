//! Policy gate configuration.

use serde::{Deserialize, Serialize};

use crate::action::ActionType;
use crate::vocabulary;

/// Settings for the planner's policy gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Keep the built-in forbidden combinations (grant + revoke on one target).
    #[serde(default = "default_true")]
    pub include_default_combinations: bool,

    /// Additional pairs of actions that must not appear together.
    #[serde(default)]
    pub forbidden_combinations: Vec<ForbiddenCombinationConfig>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            include_default_combinations: true,
            forbidden_combinations: Vec::new(),
        }
    }
}

/// A pair of action types that conflict when they share a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForbiddenCombinationConfig {
    pub name: String,
    pub first: ActionType,
    pub second: ActionType,
    /// Parameters that identify the shared target. Empty means any two
    /// actions of these types on the same platform conflict.
    #[serde(default)]
    pub target_keys: Vec<String>,
}

impl ForbiddenCombinationConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("policy.forbidden_combinations: rule name must not be empty".to_string());
        }
        for key in &self.target_keys {
            for action_type in [self.first, self.second] {
                if vocabulary::parameter_spec(action_type, key).is_none() {
                    return Err(format!(
                        "policy.forbidden_combinations.{}: '{}' is not a parameter of '{}'",
                        self.name, key, action_type
                    ));
                }
            }
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
