//! Validation error types.
//!
//! Every structural violation of an action or plan is reported as a
//! [`ValidationError`]. Errors carry the index of the offending action and the
//! parameter name where that applies, so a caller can fix every problem in one
//! pass.

use serde::Serialize;
use std::fmt;

/// A single structural violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// The kind of validation error.
    pub kind: ValidationErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// Position of the action in the plan, if the error concerns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_index: Option<usize>,
    /// Parameter or field name, if the error concerns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            action_index: None,
            field: None,
        }
    }

    /// Attach the action position.
    pub fn at(mut self, index: usize) -> Self {
        self.action_index = Some(index);
        self
    }

    fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // =========================================================================
    // PLAN ERRORS
    // =========================================================================

    pub fn empty_plan_id() -> Self {
        Self::new(ValidationErrorKind::EmptyPlanId, "Plan id must not be empty").on_field("id")
    }

    pub fn empty_plan() -> Self {
        Self::new(
            ValidationErrorKind::EmptyPlan,
            "Plan must contain at least one action",
        )
        .on_field("actions")
    }

    pub fn unsupported_vocabulary_version(found: &str, supported: &str) -> Self {
        Self::new(
            ValidationErrorKind::UnsupportedVocabularyVersion,
            format!(
                "Plan was produced under vocabulary version '{}', this validator supports '{}'",
                found, supported
            ),
        )
        .on_field("vocabularyVersion")
    }

    pub fn conflicting_idempotency_key(key: &str, platform: &str, first_index: usize) -> Self {
        Self::new(
            ValidationErrorKind::ConflictingIdempotencyKey,
            format!(
                "Idempotency key '{}' on platform '{}' is already used by action {} with a different request",
                key, platform, first_index
            ),
        )
        .on_field("idempotencyKey")
    }

    // =========================================================================
    // ACTION ERRORS
    // =========================================================================

    pub fn unknown_platform(platform: &str) -> Self {
        Self::new(
            ValidationErrorKind::UnknownPlatform,
            format!("Platform '{}' is not a supported platform", platform),
        )
        .on_field("platform")
    }

    pub fn unknown_action_type(action_type: &str) -> Self {
        Self::new(
            ValidationErrorKind::UnknownActionType,
            format!("Action type '{}' is not a supported action type", action_type),
        )
        .on_field("type")
    }

    pub fn parameters_not_object() -> Self {
        Self::new(
            ValidationErrorKind::ParametersNotObject,
            "Action parameters must be a JSON object",
        )
        .on_field("parameters")
    }

    pub fn missing_parameter(action_type: &str, name: &str) -> Self {
        Self::new(
            ValidationErrorKind::MissingParameter,
            format!("Required parameter '{}' is missing for '{}'", name, action_type),
        )
        .on_field(name)
    }

    pub fn invalid_parameter_type(name: &str, expected: &str) -> Self {
        Self::new(
            ValidationErrorKind::InvalidParameterType,
            format!("Parameter '{}' must be of type {}", name, expected),
        )
        .on_field(name)
    }

    pub fn empty_parameter(name: &str) -> Self {
        Self::new(
            ValidationErrorKind::EmptyParameter,
            format!("Parameter '{}' must not be empty", name),
        )
        .on_field(name)
    }

    pub fn parameter_out_of_range(name: &str, min: i64, max: i64) -> Self {
        Self::new(
            ValidationErrorKind::ParameterOutOfRange,
            format!("Parameter '{}' must be between {} and {}", name, min, max),
        )
        .on_field(name)
    }

    pub fn unknown_parameter(action_type: &str, name: &str) -> Self {
        Self::new(
            ValidationErrorKind::UnknownParameter,
            format!("Parameter '{}' is not accepted by '{}'", name, action_type),
        )
        .on_field(name)
    }

    pub fn empty_idempotency_key() -> Self {
        Self::new(
            ValidationErrorKind::EmptyIdempotencyKey,
            "Idempotency key, when present, must not be empty",
        )
        .on_field("idempotencyKey")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action_index {
            Some(index) => write!(f, "action {}: {}", index, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    // Plan-level
    EmptyPlanId,
    EmptyPlan,
    UnsupportedVocabularyVersion,
    ConflictingIdempotencyKey,

    // Action-level
    UnknownPlatform,
    UnknownActionType,
    ParametersNotObject,
    MissingParameter,
    InvalidParameterType,
    EmptyParameter,
    ParameterOutOfRange,
    UnknownParameter,
    EmptyIdempotencyKey,
}
