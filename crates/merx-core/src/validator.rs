//! Structural validation of actions and plans.
//!
//! The [`Validator`] is the only way to obtain an [`Action`] or a [`Plan`]. It
//! runs twice in the life of a plan: right after compilation (inside the
//! planner) and again right before execution. It has no side effects and is
//! deterministic, so validating the same draft twice yields the same output.
//!
//! Validation is structural only:
//!
//! 1. **Vocabulary** - `platform` and `type` must name members of the closed sets
//! 2. **Parameters** - required keys present, values of the declared type,
//!    integers within range, no keys outside the schema
//! 3. **Plan shape** - non-empty id, at least one action, supported vocabulary version
//! 4. **Idempotency** - one key on one platform must always describe the same request
//!
//! Plan validation accumulates every violation instead of stopping at the first.

use std::collections::HashMap;

use crate::action::{Action, ActionDraft, ActionType, Platform};
use crate::error::ValidationError;
use crate::plan::{Plan, PlanDraft};
use crate::vocabulary::{self, ParamCheck, ParamKind, VOCABULARY_VERSION};

/// Validates drafts against the action vocabulary.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    _private: (),
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a single action, reporting the first violation.
    pub fn validate_action(&self, draft: &ActionDraft) -> Result<Action, ValidationError> {
        // inspect_action never returns an empty error list.
        self.inspect_action(draft).map_err(|mut errors| errors.remove(0))
    }

    /// Validate a plan, reporting every violation.
    pub fn validate_plan(&self, draft: &PlanDraft) -> Result<Plan, Vec<ValidationError>> {
        let mut errors = Vec::new();

        if draft.id.trim().is_empty() {
            errors.push(ValidationError::empty_plan_id());
        }

        if let Some(version) = &draft.vocabulary_version {
            if vocabulary::major_version(version) != vocabulary::major_version(VOCABULARY_VERSION)
            {
                errors.push(ValidationError::unsupported_vocabulary_version(
                    version,
                    VOCABULARY_VERSION,
                ));
            }
        }

        if draft.actions.is_empty() {
            errors.push(ValidationError::empty_plan());
        }

        let mut actions = Vec::with_capacity(draft.actions.len());
        for (index, action_draft) in draft.actions.iter().enumerate() {
            match self.inspect_action(action_draft) {
                Ok(action) => actions.push((index, action)),
                Err(action_errors) => {
                    errors.extend(action_errors.into_iter().map(|e| e.at(index)));
                }
            }
        }

        errors.extend(idempotency_conflicts(&actions));

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Plan::new(
            draft.id.clone(),
            draft.description.clone(),
            draft.created_at,
            draft
                .vocabulary_version
                .clone()
                .unwrap_or_else(|| VOCABULARY_VERSION.to_string()),
            draft.metadata.clone(),
            actions.into_iter().map(|(_, action)| action).collect(),
        ))
    }

    /// Check one action, collecting all of its violations.
    fn inspect_action(&self, draft: &ActionDraft) -> Result<Action, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let platform = draft.platform.parse::<Platform>().ok();
        if platform.is_none() {
            errors.push(ValidationError::unknown_platform(&draft.platform));
        }

        let action_type = draft.action_type.parse::<ActionType>().ok();
        if action_type.is_none() {
            errors.push(ValidationError::unknown_action_type(&draft.action_type));
        }

        let parameters = draft.parameters.as_object();
        if parameters.is_none() {
            errors.push(ValidationError::parameters_not_object());
        }

        if let (Some(action_type), Some(parameters)) = (action_type, parameters) {
            for spec in action_type.parameters() {
                match parameters.get(spec.name) {
                    None if spec.required => errors.push(ValidationError::missing_parameter(
                        action_type.as_str(),
                        spec.name,
                    )),
                    None => {}
                    Some(value) => match spec.kind.check(value) {
                        ParamCheck::Ok => {}
                        ParamCheck::WrongType => errors.push(
                            ValidationError::invalid_parameter_type(spec.name, spec.kind.describe()),
                        ),
                        ParamCheck::Empty => errors.push(ValidationError::empty_parameter(spec.name)),
                        ParamCheck::OutOfRange => {
                            if let ParamKind::Integer { min, max } = spec.kind {
                                errors.push(ValidationError::parameter_out_of_range(
                                    spec.name, min, max,
                                ));
                            }
                        }
                    },
                }
            }

            for name in parameters.keys() {
                if vocabulary::parameter_spec(action_type, name).is_none() {
                    errors.push(ValidationError::unknown_parameter(action_type.as_str(), name));
                }
            }
        }

        if draft
            .idempotency_key
            .as_deref()
            .is_some_and(|key| key.trim().is_empty())
        {
            errors.push(ValidationError::empty_idempotency_key());
        }

        match (platform, action_type, parameters) {
            (Some(platform), Some(action_type), Some(parameters)) if errors.is_empty() => {
                Ok(Action::new(
                    platform,
                    action_type,
                    parameters.clone(),
                    draft.idempotency_key.clone(),
                ))
            }
            _ => Err(errors),
        }
    }
}

/// Same key, same platform, different request: the intent is ambiguous.
fn idempotency_conflicts(actions: &[(usize, Action)]) -> Vec<ValidationError> {
    let mut seen: HashMap<(Platform, &str), (usize, String)> = HashMap::new();
    let mut errors = Vec::new();

    for (index, action) in actions {
        let Some(key) = action.idempotency_key() else {
            continue;
        };
        let fingerprint = action.fingerprint();
        match seen.get(&(action.platform(), key)) {
            Some((first_index, first_fingerprint)) if *first_fingerprint != fingerprint => {
                errors.push(
                    ValidationError::conflicting_idempotency_key(
                        key,
                        action.platform().as_str(),
                        *first_index,
                    )
                    .at(*index),
                );
            }
            Some(_) => {}
            None => {
                seen.insert((action.platform(), key), (*index, fingerprint));
            }
        }
    }

    errors
}
