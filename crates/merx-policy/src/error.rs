//! Policy error types.

use serde::Serialize;
use thiserror::Error;

/// Categories of policy rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyErrorKind {
    /// The plan has more actions than allowed.
    TooManyActions,
    /// An action targets a platform outside the allow-list.
    PlatformNotAllowed,
    /// Two actions form a forbidden pairing.
    ForbiddenCombination,
    /// Rejected by a gate added outside this crate.
    Custom,
}

/// A gate rejected an otherwise well-formed plan.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("policy gate '{gate}' rejected the plan: {message}")]
pub struct PolicyError {
    /// Name of the gate that rejected the plan.
    pub gate: String,
    pub kind: PolicyErrorKind,
    pub message: String,
    /// Positions of the offending actions, when the rejection is about specific ones.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub action_indices: Vec<usize>,
}

impl PolicyError {
    pub fn new(gate: impl Into<String>, kind: PolicyErrorKind, message: impl Into<String>) -> Self {
        Self {
            gate: gate.into(),
            kind,
            message: message.into(),
            action_indices: Vec::new(),
        }
    }

    pub fn with_actions(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.action_indices = indices.into_iter().collect();
        self
    }

    pub fn too_many_actions(gate: &str, count: usize, max: usize) -> Self {
        Self::new(
            gate,
            PolicyErrorKind::TooManyActions,
            format!("plan has {} actions, the maximum is {}", count, max),
        )
    }

    pub fn platform_not_allowed(gate: &str, platform: &str, allowed: &[String]) -> Self {
        Self::new(
            gate,
            PolicyErrorKind::PlatformNotAllowed,
            format!(
                "platform '{}' is not in the allowed platforms [{}]",
                platform,
                allowed.join(", ")
            ),
        )
    }

    pub fn forbidden_combination(gate: &str, rule: &str, first: usize, second: usize) -> Self {
        Self::new(
            gate,
            PolicyErrorKind::ForbiddenCombination,
            format!(
                "actions {} and {} form the forbidden combination '{}'",
                first, second, rule
            ),
        )
        .with_actions([first, second])
    }
}
