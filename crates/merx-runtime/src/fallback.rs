//! Non-destructive fallback connector.
//!
//! Used whenever no live credential is configured, so planning and dry runs
//! never need real platform access. Responses are synthetic and
//! deterministic: identifiers are UUIDv5 values derived from the action
//! fingerprint, so the same action always yields the same payload.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use merx_core::{Action, ActionResult, ActionType, ConnectorConfig, ConnectorMode, Platform};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::connector::{Connector, ConnectorError, ConnectorMetadata, HealthStatus};

/// Supports every action type and never performs I/O.
#[derive(Debug)]
pub struct FallbackConnector {
    platform: Platform,
    /// Set when live mode was requested; the connector still simulates.
    live_requested: bool,
    side_effects: AtomicU64,
}

impl FallbackConnector {
    pub const NAME: &'static str = "fallback";

    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            live_requested: false,
            side_effects: AtomicU64::new(0),
        }
    }

    /// Number of simulated state changes performed so far.
    pub fn side_effects(&self) -> u64 {
        self.side_effects.load(Ordering::SeqCst)
    }

    fn synthetic_id(&self, prefix: &str, action: &Action) -> String {
        let name = format!("merx:{}:{}", prefix, action.fingerprint());
        let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes());
        format!("{}_{}", prefix, id.simple())
    }

    fn payload(&self, action: &Action) -> Map<String, Value> {
        let param = |name: &str| action.parameter(name).cloned().unwrap_or(Value::Null);

        let body = match action.action_type() {
            ActionType::CreateCustomer => json!({
                "customer": {
                    "id": self.synthetic_id("cus", action),
                    "email": param("email"),
                    "name": param("name"),
                }
            }),
            ActionType::GetCustomer => json!({
                "customer": { "id": param("customer_id") }
            }),
            ActionType::UpdateCustomer => {
                let updated: Vec<&String> = action
                    .parameters()
                    .keys()
                    .filter(|k| k.as_str() != "customer_id")
                    .collect();
                json!({
                    "customer": { "id": param("customer_id") },
                    "updated": updated,
                })
            }
            ActionType::ListPayments => json!({
                "payments": [],
                "hasMore": false,
                "limit": param("limit"),
            }),
            ActionType::GetPayment => json!({
                "payment": { "id": param("payment_id"), "status": "unknown" }
            }),
            ActionType::ListSubscriptions => json!({
                "subscriptions": [],
                "hasMore": false,
                "limit": param("limit"),
            }),
            ActionType::GetSubscription => json!({
                "subscription": { "id": param("subscription_id"), "status": "unknown" }
            }),
            ActionType::CancelSubscription => {
                let at_period_end = action
                    .parameter("at_period_end")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                json!({
                    "subscription": {
                        "id": param("subscription_id"),
                        "status": if at_period_end { "active" } else { "canceled" },
                        "cancelAtPeriodEnd": at_period_end,
                    }
                })
            }
            ActionType::CheckAccess => json!({
                "userId": param("user_id"),
                "resourceId": param("resource_id"),
                "hasAccess": false,
            }),
            ActionType::GrantAccess => json!({
                "grantId": self.synthetic_id("grant", action),
                "userId": param("user_id"),
                "resourceId": param("resource_id"),
                "granted": true,
            }),
            ActionType::RevokeAccess => json!({
                "userId": param("user_id"),
                "resourceId": param("resource_id"),
                "revoked": true,
            }),
            ActionType::SendNotification => json!({
                "messageId": self.synthetic_id("msg", action),
                "recipient": param("recipient"),
                "queued": true,
            }),
        };

        let mut data = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        data.insert("mode".into(), json!("fallback"));
        data.insert("simulated".into(), json!(true));
        data.insert("platform".into(), json!(self.platform));
        data
    }
}

#[async_trait]
impl Connector for FallbackConnector {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn initialize(&mut self, config: &ConnectorConfig) -> Result<(), ConnectorError> {
        if config.mode == ConnectorMode::Live {
            self.live_requested = true;
            if config.credential().is_none() {
                tracing::warn!(
                    platform = %self.platform,
                    credentials_env = config.credentials_env.as_deref().unwrap_or(""),
                    "Live mode requested without credentials; staying in fallback mode"
                );
            } else {
                tracing::warn!(
                    platform = %self.platform,
                    "No live connector available; staying in fallback mode"
                );
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        let status = HealthStatus::healthy();
        if self.live_requested {
            status.with_message("live mode requested, running in fallback mode")
        } else {
            status
        }
    }

    fn supports_action(&self, _action_type: ActionType) -> bool {
        true
    }

    async fn execute_action(&self, action: &Action) -> Result<ActionResult, ConnectorError> {
        if action.platform() != self.platform {
            return Err(ConnectorError::Unsupported {
                platform: self.platform,
                action: action.action_type(),
            });
        }

        if action.action_type().is_mutating() {
            self.side_effects.fetch_add(1, Ordering::SeqCst);
        }

        tracing::debug!(
            platform = %self.platform,
            action = %action.action_type(),
            "Simulated action"
        );
        Ok(ActionResult::success(action, Value::Object(self.payload(action))))
    }

    fn metadata(&self) -> ConnectorMetadata {
        ConnectorMetadata {
            name: format!("{}-{}", Self::NAME, self.platform),
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: self.platform,
            capabilities: ActionType::ALL.to_vec(),
            mode: ConnectorMode::Fallback,
            batch_execution: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merx_core::{ActionDraft, Validator};

    fn action(draft: ActionDraft) -> Action {
        Validator::new().validate_action(&draft).unwrap()
    }

    #[tokio::test]
    async fn payloads_are_labelled_and_deterministic() {
        let connector = FallbackConnector::new(Platform::Stripe);
        let create = action(
            ActionDraft::of(Platform::Stripe, ActionType::CreateCustomer)
                .param("email", "ada@example.com"),
        );

        let first = connector.execute_action(&create).await.unwrap();
        let second = connector.execute_action(&create).await.unwrap();
        let data = first.data().unwrap();
        assert_eq!(data["mode"], "fallback");
        assert_eq!(data["simulated"], true);
        assert_eq!(data["customer"]["email"], "ada@example.com");
        assert!(data["customer"]["id"].as_str().unwrap().starts_with("cus_"));
        assert_eq!(first.data(), second.data());
    }

    #[tokio::test]
    async fn counts_only_mutating_actions() {
        let connector = FallbackConnector::new(Platform::Whop);
        let list =
            action(ActionDraft::of(Platform::Whop, ActionType::ListPayments).param("limit", 5));
        let grant = action(
            ActionDraft::of(Platform::Whop, ActionType::GrantAccess)
                .param("user_id", "user_1")
                .param("resource_id", "res_1"),
        );
        connector.execute_action(&list).await.unwrap();
        connector.execute_action(&grant).await.unwrap();
        assert_eq!(connector.side_effects(), 1);
    }

    #[tokio::test]
    async fn rejects_foreign_platform_actions() {
        let connector = FallbackConnector::new(Platform::Whop);
        let list = action(ActionDraft::of(Platform::Paypal, ActionType::ListPayments));
        let err = connector.execute_action(&list).await.unwrap_err();
        assert!(matches!(err, ConnectorError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn live_mode_without_credentials_stays_fallback() {
        let mut connector = FallbackConnector::new(Platform::Stripe);
        let config = ConnectorConfig {
            mode: ConnectorMode::Live,
            credentials_env: Some("MERX_TEST_UNSET_STRIPE_KEY".into()),
            ..Default::default()
        };
        connector.initialize(&config).await.unwrap();
        assert_eq!(connector.metadata().mode, ConnectorMode::Fallback);
        let health = connector.health_check().await;
        assert!(health.healthy);
        assert!(health.message.is_some());
    }
}
