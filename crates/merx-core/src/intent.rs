//! Intents: the unvalidated input consumed by a compiler.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::Platform;

/// Loosely specified request: a prompt plus optional context and constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<IntentContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
}

impl Intent {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            context: None,
            constraints: None,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.context.get_or_insert_with(IntentContext::default).platform = Some(platform);
        self
    }

    /// Add a free-form context value (e.g. a customer id the UI already knows).
    pub fn with_context_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context
            .get_or_insert_with(IntentContext::default)
            .values
            .insert(key.into(), value.into());
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Hinted platform, if any.
    pub fn platform_hint(&self) -> Option<Platform> {
        self.context.as_ref().and_then(|c| c.platform)
    }
}

/// Structured context accompanying a prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Any other hints, passed to parameter inference.
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

/// Limits a plan must respect before it is considered executable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_actions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_platforms: Option<Vec<Platform>>,
}

impl Constraints {
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn with_max_actions(mut self, max: usize) -> Self {
        self.max_actions = Some(max);
        self
    }

    pub fn with_allowed_platforms(mut self, platforms: impl IntoIterator<Item = Platform>) -> Self {
        self.allowed_platforms = Some(platforms.into_iter().collect());
        self
    }

    /// Combine two constraint sets, keeping the stricter value of each.
    ///
    /// `maxActions` takes the minimum; allow-lists are intersected. An absent
    /// value never loosens the other side.
    pub fn merge_stricter(&self, other: &Constraints) -> Constraints {
        let max_actions = match (self.max_actions, other.max_actions) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let allowed_platforms = match (&self.allowed_platforms, &other.allowed_platforms) {
            (Some(a), Some(b)) => Some(a.iter().copied().filter(|p| b.contains(p)).collect()),
            (a, b) => a.clone().or_else(|| b.clone()),
        };

        Constraints {
            max_actions,
            allowed_platforms,
        }
    }

    /// Whether a platform passes the allow-list (always true without one).
    pub fn allows(&self, platform: Platform) -> bool {
        self.allowed_platforms
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&platform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_deserializes_external_shape() {
        let intent: Intent = serde_json::from_str(
            r#"{"prompt":"list the last 10 payments","context":{"platform":"whop","customer_id":"cus_1"},"constraints":{"maxActions":3,"allowedPlatforms":["whop"]}}"#,
        )
        .unwrap();
        assert_eq!(intent.platform_hint(), Some(Platform::Whop));
        let context = intent.context.unwrap();
        assert_eq!(context.values.get("customer_id"), Some(&Value::from("cus_1")));
        let constraints = intent.constraints.unwrap();
        assert_eq!(constraints.max_actions, Some(3));
        assert_eq!(constraints.allowed_platforms, Some(vec![Platform::Whop]));
    }

    #[test]
    fn merge_keeps_stricter_values() {
        let a = Constraints::unconstrained()
            .with_max_actions(10)
            .with_allowed_platforms([Platform::Whop, Platform::Stripe]);
        let b = Constraints::unconstrained()
            .with_max_actions(4)
            .with_allowed_platforms([Platform::Stripe, Platform::Email]);
        let merged = a.merge_stricter(&b);
        assert_eq!(merged.max_actions, Some(4));
        assert_eq!(merged.allowed_platforms, Some(vec![Platform::Stripe]));
    }

    #[test]
    fn merge_with_unconstrained_is_identity() {
        let a = Constraints::unconstrained().with_max_actions(2);
        assert_eq!(a.merge_stricter(&Constraints::unconstrained()), a);
        assert_eq!(Constraints::unconstrained().merge_stricter(&a), a);
    }

    #[test]
    fn allows_without_list_accepts_everything() {
        let c = Constraints::unconstrained();
        assert!(Platform::ALL.iter().all(|p| c.allows(*p)));
        let c = c.with_allowed_platforms([Platform::Email]);
        assert!(c.allows(Platform::Email));
        assert!(!c.allows(Platform::Whop));
    }
}
