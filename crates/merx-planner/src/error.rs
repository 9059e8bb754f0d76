//! Planning errors.

use merx_core::{PlanResponse, ValidationError};
use merx_policy::PolicyError;
use thiserror::Error;

/// Why a plan was not produced.
#[derive(Debug, Error)]
pub enum PlanningError {
    /// The compiler itself failed; no draft was produced.
    #[error("compiler failed: {0:#}")]
    Compilation(anyhow::Error),

    #[error("plan failed validation with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl PlanningError {
    /// Every individual failure message.
    pub fn reasons(&self) -> Vec<String> {
        match self {
            PlanningError::Compilation(err) => vec![format!("{err:#}")],
            PlanningError::Validation(errors) => errors.iter().map(ToString::to_string).collect(),
            PlanningError::Policy(err) => vec![err.message.clone()],
        }
    }
}

impl From<Vec<ValidationError>> for PlanningError {
    fn from(errors: Vec<ValidationError>) -> Self {
        PlanningError::Validation(errors)
    }
}

impl From<PlanningError> for PlanResponse {
    fn from(err: PlanningError) -> Self {
        PlanResponse::rejected(err.to_string(), err.reasons())
    }
}
