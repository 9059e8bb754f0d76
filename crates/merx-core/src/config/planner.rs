//! Planner configuration.

use serde::{Deserialize, Serialize};

use crate::action::Platform;
use crate::intent::Constraints;

/// Settings for the compiler and planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Platform used when neither the intent nor the prompt names one.
    #[serde(default = "default_platform")]
    pub default_platform: Platform,

    /// Constraints applied to every plan, merged with the intent's own
    /// constraints (the stricter value wins).
    #[serde(default)]
    pub default_constraints: Constraints,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_platform: default_platform(),
            default_constraints: Constraints::default(),
        }
    }
}

fn default_platform() -> Platform {
    Platform::Whop
}
