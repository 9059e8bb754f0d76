//! Closed action vocabulary: platforms, action types and actions.
//!
//! `Platform` and `ActionType` are closed enums. Anything that arrives from
//! outside the process (compiler output, hand-written plans) is carried as an
//! [`ActionDraft`] with free-form strings until the [`Validator`] turns it into
//! an [`Action`]. An `Action` can only be obtained through validation, so a
//! connector never sees a platform or type outside the vocabulary.
//!
//! [`Validator`]: crate::validator::Validator

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::vocabulary::{self, ParameterSpec};

/// External commerce platforms an action may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Whop,
    Stripe,
    Paypal,
    Discord,
    Email,
}

impl Platform {
    /// Every platform, in declaration order.
    pub const ALL: [Platform; 5] = [
        Platform::Whop,
        Platform::Stripe,
        Platform::Paypal,
        Platform::Discord,
        Platform::Email,
    ];

    /// Wire name of the platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Whop => "whop",
            Platform::Stripe => "stripe",
            Platform::Paypal => "paypal",
            Platform::Discord => "discord",
            Platform::Email => "email",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// Kinds of action the core knows how to plan and route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CreateCustomer,
    GetCustomer,
    UpdateCustomer,
    ListPayments,
    GetPayment,
    ListSubscriptions,
    GetSubscription,
    CancelSubscription,
    CheckAccess,
    GrantAccess,
    RevokeAccess,
    SendNotification,
}

impl ActionType {
    /// Every action type, in declaration order.
    pub const ALL: [ActionType; 12] = [
        ActionType::CreateCustomer,
        ActionType::GetCustomer,
        ActionType::UpdateCustomer,
        ActionType::ListPayments,
        ActionType::GetPayment,
        ActionType::ListSubscriptions,
        ActionType::GetSubscription,
        ActionType::CancelSubscription,
        ActionType::CheckAccess,
        ActionType::GrantAccess,
        ActionType::RevokeAccess,
        ActionType::SendNotification,
    ];

    /// Wire name of the action type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateCustomer => "create_customer",
            ActionType::GetCustomer => "get_customer",
            ActionType::UpdateCustomer => "update_customer",
            ActionType::ListPayments => "list_payments",
            ActionType::GetPayment => "get_payment",
            ActionType::ListSubscriptions => "list_subscriptions",
            ActionType::GetSubscription => "get_subscription",
            ActionType::CancelSubscription => "cancel_subscription",
            ActionType::CheckAccess => "check_access",
            ActionType::GrantAccess => "grant_access",
            ActionType::RevokeAccess => "revoke_access",
            ActionType::SendNotification => "send_notification",
        }
    }

    /// Whether the action changes state on the target platform.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            ActionType::GetCustomer
                | ActionType::ListPayments
                | ActionType::GetPayment
                | ActionType::ListSubscriptions
                | ActionType::GetSubscription
                | ActionType::CheckAccess
        )
    }

    /// Parameter schema for this action type.
    pub fn parameters(&self) -> &'static [ParameterSpec] {
        vocabulary::parameter_specs(*self)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// A string that does not name a member of a closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

/// A validated action.
///
/// Only the validator constructs these; fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    platform: Platform,
    #[serde(rename = "type")]
    action_type: ActionType,
    parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    idempotency_key: Option<String>,
}

impl Action {
    pub(crate) fn new(
        platform: Platform,
        action_type: ActionType,
        parameters: Map<String, Value>,
        idempotency_key: Option<String>,
    ) -> Self {
        Self {
            platform,
            action_type,
            parameters,
            idempotency_key,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Look up a single parameter.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Look up a string parameter.
    pub fn str_parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    /// Canonical identity of the side effect this action requests.
    ///
    /// Two actions with the same fingerprint ask for the same thing. The
    /// idempotency key itself is not part of the fingerprint.
    pub fn fingerprint(&self) -> String {
        // serde_json::Map is ordered, so the encoding is stable.
        let body = Value::Object(self.parameters.clone());
        format!("{}/{}/{}", self.platform, self.action_type, body)
    }
}

/// An action as produced by a compiler or submitted by a caller, not yet validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDraft {
    pub platform: String,
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default = "empty_object")]
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl ActionDraft {
    /// Start a draft with an empty parameter map.
    pub fn new(platform: impl Into<String>, action_type: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            action_type: action_type.into(),
            parameters: empty_object(),
            idempotency_key: None,
        }
    }

    /// Start a draft from vocabulary members.
    pub fn of(platform: Platform, action_type: ActionType) -> Self {
        Self::new(platform.as_str(), action_type.as_str())
    }

    /// Set one parameter. Replaces non-object parameters with an object.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        if !self.parameters.is_object() {
            self.parameters = empty_object();
        }
        if let Value::Object(map) = &mut self.parameters {
            map.insert(name.into(), value.into());
        }
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

impl From<&Action> for ActionDraft {
    fn from(action: &Action) -> Self {
        Self {
            platform: action.platform.as_str().to_string(),
            action_type: action.action_type.as_str().to_string(),
            parameters: Value::Object(action.parameters.clone()),
            idempotency_key: action.idempotency_key.clone(),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
