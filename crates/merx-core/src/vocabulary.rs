//! Per-action parameter schemas.
//!
//! Each [`ActionType`] has a fixed list of parameters. Required parameters must
//! be present; anything not listed is rejected by the validator.

use serde::Serialize;
use serde_json::Value;

use crate::action::ActionType;

/// Version of the action vocabulary. Plans record the version they were
/// produced under; a plan from a different major version is rejected.
pub const VOCABULARY_VERSION: &str = "1.0";

/// Upper bound for `limit` on list actions.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Expected JSON shape of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer { min: i64, max: i64 },
    Boolean,
    Object,
}

/// Outcome of checking a value against a [`ParamKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamCheck {
    Ok,
    WrongType,
    Empty,
    OutOfRange,
}

impl ParamKind {
    /// Human-readable name of the expected type.
    pub fn describe(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer { .. } => "integer",
            ParamKind::Boolean => "boolean",
            ParamKind::Object => "object",
        }
    }

    pub fn check(&self, value: &Value) -> ParamCheck {
        match (self, value) {
            (ParamKind::String, Value::String(s)) if s.trim().is_empty() => ParamCheck::Empty,
            (ParamKind::String, Value::String(_)) => ParamCheck::Ok,
            (ParamKind::Integer { min, max }, Value::Number(n)) => match n.as_i64() {
                Some(v) if v < *min || v > *max => ParamCheck::OutOfRange,
                Some(_) => ParamCheck::Ok,
                None => ParamCheck::WrongType,
            },
            (ParamKind::Boolean, Value::Bool(_)) => ParamCheck::Ok,
            (ParamKind::Object, Value::Object(_)) => ParamCheck::Ok,
            _ => ParamCheck::WrongType,
        }
    }
}

/// One entry of an action type's parameter schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

const fn req(name: &'static str, kind: ParamKind) -> ParameterSpec {
    ParameterSpec {
        name,
        kind,
        required: true,
    }
}

const fn opt(name: &'static str, kind: ParamKind) -> ParameterSpec {
    ParameterSpec {
        name,
        kind,
        required: false,
    }
}

const LIMIT: ParamKind = ParamKind::Integer {
    min: 1,
    max: MAX_LIST_LIMIT,
};

const CREATE_CUSTOMER: &[ParameterSpec] = &[
    req("email", ParamKind::String),
    opt("name", ParamKind::String),
    opt("metadata", ParamKind::Object),
];

const GET_CUSTOMER: &[ParameterSpec] = &[req("customer_id", ParamKind::String)];

const UPDATE_CUSTOMER: &[ParameterSpec] = &[
    req("customer_id", ParamKind::String),
    opt("email", ParamKind::String),
    opt("name", ParamKind::String),
    opt("metadata", ParamKind::Object),
];

const LIST_PAYMENTS: &[ParameterSpec] = &[
    opt("limit", LIMIT),
    opt("customer_id", ParamKind::String),
    opt("status", ParamKind::String),
    opt("starting_after", ParamKind::String),
];

const GET_PAYMENT: &[ParameterSpec] = &[req("payment_id", ParamKind::String)];

const LIST_SUBSCRIPTIONS: &[ParameterSpec] = &[
    opt("limit", LIMIT),
    opt("customer_id", ParamKind::String),
    opt("status", ParamKind::String),
];

const GET_SUBSCRIPTION: &[ParameterSpec] = &[req("subscription_id", ParamKind::String)];

const CANCEL_SUBSCRIPTION: &[ParameterSpec] = &[
    req("subscription_id", ParamKind::String),
    opt("at_period_end", ParamKind::Boolean),
    opt("reason", ParamKind::String),
];

const CHECK_ACCESS: &[ParameterSpec] = &[
    req("user_id", ParamKind::String),
    req("resource_id", ParamKind::String),
];

const GRANT_ACCESS: &[ParameterSpec] = &[
    req("user_id", ParamKind::String),
    req("resource_id", ParamKind::String),
    opt("expires_at", ParamKind::String),
];

const REVOKE_ACCESS: &[ParameterSpec] = &[
    req("user_id", ParamKind::String),
    req("resource_id", ParamKind::String),
    opt("reason", ParamKind::String),
];

const SEND_NOTIFICATION: &[ParameterSpec] = &[
    req("recipient", ParamKind::String),
    req("message", ParamKind::String),
    opt("subject", ParamKind::String),
    opt("channel", ParamKind::String),
];

/// Parameter schema for an action type.
pub fn parameter_specs(action_type: ActionType) -> &'static [ParameterSpec] {
    match action_type {
        ActionType::CreateCustomer => CREATE_CUSTOMER,
        ActionType::GetCustomer => GET_CUSTOMER,
        ActionType::UpdateCustomer => UPDATE_CUSTOMER,
        ActionType::ListPayments => LIST_PAYMENTS,
        ActionType::GetPayment => GET_PAYMENT,
        ActionType::ListSubscriptions => LIST_SUBSCRIPTIONS,
        ActionType::GetSubscription => GET_SUBSCRIPTION,
        ActionType::CancelSubscription => CANCEL_SUBSCRIPTION,
        ActionType::CheckAccess => CHECK_ACCESS,
        ActionType::GrantAccess => GRANT_ACCESS,
        ActionType::RevokeAccess => REVOKE_ACCESS,
        ActionType::SendNotification => SEND_NOTIFICATION,
    }
}

/// Find the spec for one parameter of an action type.
pub fn parameter_spec(action_type: ActionType, name: &str) -> Option<&'static ParameterSpec> {
    parameter_specs(action_type).iter().find(|p| p.name == name)
}

/// Major component of a vocabulary version string ("1.0" -> "1").
pub fn major_version(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_action_type_has_a_schema_with_unique_names() {
        for action_type in ActionType::ALL {
            let specs = parameter_specs(action_type);
            let mut names: Vec<_> = specs.iter().map(|s| s.name).collect();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), specs.len(), "{action_type} has duplicate parameters");
        }
    }

    #[test]
    fn integer_kind_enforces_range() {
        assert_eq!(LIMIT.check(&json!(10)), ParamCheck::Ok);
        assert_eq!(LIMIT.check(&json!(0)), ParamCheck::OutOfRange);
        assert_eq!(LIMIT.check(&json!(101)), ParamCheck::OutOfRange);
        assert_eq!(LIMIT.check(&json!(1.5)), ParamCheck::WrongType);
        assert_eq!(LIMIT.check(&json!("10")), ParamCheck::WrongType);
    }

    #[test]
    fn blank_strings_are_empty() {
        assert_eq!(ParamKind::String.check(&json!("  ")), ParamCheck::Empty);
        assert_eq!(ParamKind::String.check(&json!("cus_1")), ParamCheck::Ok);
    }

    #[test]
    fn major_version_splits_on_dot() {
        assert_eq!(major_version("1.0"), "1");
        assert_eq!(major_version("2"), "2");
    }

    #[test]
    fn access_actions_share_target_parameters() {
        for t in [ActionType::GrantAccess, ActionType::RevokeAccess, ActionType::CheckAccess] {
            assert!(parameter_spec(t, "user_id").is_some_and(|s| s.required));
            assert!(parameter_spec(t, "resource_id").is_some_and(|s| s.required));
        }
    }
}
