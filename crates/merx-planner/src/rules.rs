//! Keyword rules used by [`RuleCompiler`](crate::RuleCompiler).
//!
//! A prompt is split into clauses; each clause maps to at most one action.
//! Rules are ordered most specific first, so "cancel subscription sub_1"
//! never degrades into a subscription lookup.

use std::sync::LazyLock;

use merx_core::vocabulary::MAX_LIST_LIMIT;
use merx_core::{ActionType, Platform};
use regex::Regex;
use serde_json::{Map, Value};

static CLAUSE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[;\n]|\.\s+|,?\s+(?:and\s+)?then\s+").expect("clause separator pattern")
});

static COUNT_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:last|first|top|recent|latest)\s+(\d{1,6})\b").expect("count pattern")
});

static COUNT_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,6})\s+(?:most\s+recent\s+|recent\s+|latest\s+)?(?:payments?|charges?|transactions?|subscriptions?)\b",
    )
    .expect("count pattern")
});

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:cus|cust|pay|pi|ch|sub|user|usr|res|prod)_[A-Za-z0-9_-]+)")
        .expect("identifier pattern")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email pattern")
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["“]([^"”]+)["”]"#).expect("quoted pattern"));

static NAMED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[Nn]amed|[Cc]alled)\s+([A-Za-z][\w'-]*(?:\s+[A-Z][\w'-]*)?)")
        .expect("name pattern")
});

static MESSAGE_LEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:saying|that says|with message|message:|about)\s+(.+)$")
        .expect("message pattern")
});

static REASON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbecause\s+(.+)$").expect("reason pattern"));

const CANCEL: &[&str] = &["cancel", "cancels", "terminate", "stop", "unsubscribe"];
const REVOKE: &[&str] = &[
    "revoke", "remove", "deny", "withdraw", "disable", "kick", "ban", "take",
];
const GRANT: &[&str] = &[
    "grant", "give", "allow", "add", "provide", "enable", "invite",
];
const CREATE: &[&str] = &["create", "add", "new", "register", "onboard"];
const UPDATE: &[&str] = &["update", "change", "edit", "modify", "rename", "set"];
const CHANNEL: &[&str] = &["via", "by", "over", "through"];
const NOTIFY: &[&str] = &[
    "notify", "notification", "message", "remind", "reminder", "alert", "dm", "ping", "send",
    "tell",
];

/// One clause of a prompt, in original and lowercase form.
#[derive(Debug, Clone)]
pub(crate) struct Clause {
    text: String,
    words: Vec<String>,
}

impl Clause {
    fn new(text: &str) -> Self {
        let text = text.trim().trim_end_matches(['.', ',', '!', '?']).trim().to_string();
        let words = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self { text, words }
    }

    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    fn has(&self, keywords: &[&str]) -> bool {
        self.words.iter().any(|w| keywords.contains(&w.as_str()))
    }

    fn has_stem(&self, stems: &[&str]) -> bool {
        self.words
            .iter()
            .any(|w| stems.iter().any(|s| w.starts_with(s)))
    }

    fn mentions_subscription(&self) -> bool {
        self.has_stem(&["subscri", "membership"])
    }

    fn mentions_payment(&self) -> bool {
        self.has_stem(&["payment", "charge", "transaction"])
    }

    fn mentions_customer(&self) -> bool {
        self.has_stem(&["customer", "client"])
    }

    fn mentions_access(&self) -> bool {
        self.has_stem(&["access", "permission", "role"])
    }

    fn wants_notification(&self) -> bool {
        self.has(NOTIFY) || self.words.first().is_some_and(|w| w == "email")
    }

    /// First identifier carrying one of `prefixes`.
    fn identifier(&self, prefixes: &[&str]) -> Option<String> {
        IDENTIFIER
            .captures_iter(&self.text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .find(|id| {
                id.split_once('_')
                    .is_some_and(|(prefix, _)| prefixes.contains(&prefix))
            })
            .map(str::to_string)
    }

    fn customer_id(&self) -> Option<String> {
        self.identifier(&["cus", "cust"])
    }

    fn payment_id(&self) -> Option<String> {
        self.identifier(&["pay", "pi", "ch"])
    }

    fn subscription_id(&self) -> Option<String> {
        self.identifier(&["sub"])
    }

    fn user_id(&self) -> Option<String> {
        self.identifier(&["user", "usr"])
    }

    fn resource_id(&self) -> Option<String> {
        self.identifier(&["res", "prod"])
    }

    fn email(&self) -> Option<String> {
        EMAIL.find(&self.text).map(|m| m.as_str().to_string())
    }

    /// Requested list size, clamped to what a list action accepts.
    fn count(&self) -> Option<i64> {
        COUNT_AFTER
            .captures(&self.text)
            .or_else(|| COUNT_BEFORE.captures(&self.text))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .map(|n| n.clamp(1, MAX_LIST_LIMIT))
    }

    fn name(&self) -> Option<String> {
        NAMED
            .captures(&self.text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn reason(&self) -> Option<String> {
        REASON
            .captures(&self.text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    }

    fn payment_status(&self) -> Option<&'static str> {
        self.words.iter().find_map(|w| match w.as_str() {
            "failed" | "unsuccessful" => Some("failed"),
            "succeeded" | "successful" | "paid" => Some("succeeded"),
            "refunded" => Some("refunded"),
            "pending" => Some("pending"),
            "disputed" => Some("disputed"),
            _ => None,
        })
    }

    fn subscription_status(&self) -> Option<&'static str> {
        if self.text.to_lowercase().contains("past due") {
            return Some("past_due");
        }
        self.words.iter().find_map(|w| match w.as_str() {
            "active" => Some("active"),
            "canceled" | "cancelled" => Some("canceled"),
            "trialing" | "trial" => Some("trialing"),
            "unpaid" => Some("unpaid"),
            "past_due" => Some("past_due"),
            _ => None,
        })
    }

    fn at_period_end(&self) -> Option<bool> {
        let lower = self.text.to_lowercase();
        if lower.contains("period end") || (lower.contains("end of the") && lower.contains("period")) {
            Some(true)
        } else if self.has(&["immediately", "now"]) {
            Some(false)
        } else {
            None
        }
    }

    fn message(&self) -> String {
        if let Some(quoted) = QUOTED.captures(&self.text).and_then(|c| c.get(1)) {
            return quoted.as_str().to_string();
        }
        MESSAGE_LEAD
            .captures(&self.text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| self.text.clone())
    }

    /// A platform named in this clause.
    ///
    /// `email` only counts when used as a channel ("via email"), since the word
    /// is also a customer field.
    pub(crate) fn platform(&self) -> Option<Platform> {
        for (i, word) in self.words.iter().enumerate() {
            let platform = match word.as_str() {
                "whop" => Some(Platform::Whop),
                "stripe" => Some(Platform::Stripe),
                "paypal" => Some(Platform::Paypal),
                "discord" => Some(Platform::Discord),
                "email" if i > 0 && CHANNEL.contains(&self.words[i - 1].as_str()) => {
                    Some(Platform::Email)
                }
                _ => None,
            };
            if platform.is_some() {
                return platform;
            }
        }
        None
    }
}

/// Split a prompt into non-empty clauses.
pub(crate) fn clauses(prompt: &str) -> Vec<Clause> {
    CLAUSE_SEPARATOR
        .split(prompt)
        .map(Clause::new)
        .filter(|c| !c.words.is_empty())
        .collect()
}

/// The action type a clause asks for, if any rule matches.
pub(crate) fn classify(clause: &Clause) -> Option<ActionType> {
    let subscription = clause.mentions_subscription();
    let access = clause.mentions_access();
    let customer = clause.mentions_customer();
    let notify = clause.wants_notification();

    if subscription && clause.has(CANCEL) {
        return Some(ActionType::CancelSubscription);
    }
    if access {
        if clause.has(REVOKE) {
            return Some(ActionType::RevokeAccess);
        }
        if clause.has(GRANT) {
            return Some(ActionType::GrantAccess);
        }
        return Some(ActionType::CheckAccess);
    }
    if customer && clause.has(CREATE) {
        return Some(ActionType::CreateCustomer);
    }
    if customer && clause.has(UPDATE) {
        return Some(ActionType::UpdateCustomer);
    }
    if customer && !notify && !clause.mentions_payment() && !subscription {
        return Some(ActionType::GetCustomer);
    }
    if clause.mentions_payment() && !notify {
        return Some(if clause.payment_id().is_some() {
            ActionType::GetPayment
        } else {
            ActionType::ListPayments
        });
    }
    if subscription && !notify {
        return Some(if clause.subscription_id().is_some() {
            ActionType::GetSubscription
        } else {
            ActionType::ListSubscriptions
        });
    }
    if notify {
        return Some(ActionType::SendNotification);
    }
    None
}

/// Parameters for `action_type` drawn from the clause, then from context
/// entries that belong to the action's schema.
pub(crate) fn infer_parameters(
    action_type: ActionType,
    clause: &Clause,
    context: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut params = Map::new();
    let mut put = |name: &str, value: Option<Value>| {
        if let Some(value) = value {
            params.insert(name.to_string(), value);
        }
    };

    match action_type {
        ActionType::CreateCustomer => {
            put("email", clause.email().map(Value::from));
            put("name", clause.name().map(Value::from));
        }
        ActionType::GetCustomer => {
            put("customer_id", clause.customer_id().map(Value::from));
        }
        ActionType::UpdateCustomer => {
            put("customer_id", clause.customer_id().map(Value::from));
            put("email", clause.email().map(Value::from));
            put("name", clause.name().map(Value::from));
        }
        ActionType::ListPayments => {
            put("limit", clause.count().map(Value::from));
            put("customer_id", clause.customer_id().map(Value::from));
            put("status", clause.payment_status().map(Value::from));
        }
        ActionType::GetPayment => {
            put("payment_id", clause.payment_id().map(Value::from));
        }
        ActionType::ListSubscriptions => {
            put("limit", clause.count().map(Value::from));
            put("customer_id", clause.customer_id().map(Value::from));
            put("status", clause.subscription_status().map(Value::from));
        }
        ActionType::GetSubscription => {
            put("subscription_id", clause.subscription_id().map(Value::from));
        }
        ActionType::CancelSubscription => {
            put("subscription_id", clause.subscription_id().map(Value::from));
            put("at_period_end", clause.at_period_end().map(Value::from));
            put("reason", clause.reason().map(Value::from));
        }
        ActionType::CheckAccess | ActionType::GrantAccess => {
            put("user_id", clause.user_id().map(Value::from));
            put("resource_id", clause.resource_id().map(Value::from));
        }
        ActionType::RevokeAccess => {
            put("user_id", clause.user_id().map(Value::from));
            put("resource_id", clause.resource_id().map(Value::from));
            put("reason", clause.reason().map(Value::from));
        }
        ActionType::SendNotification => {
            let recipient = clause
                .email()
                .or_else(|| clause.user_id())
                .or_else(|| clause.customer_id());
            put("recipient", recipient.map(Value::from));
            put("message", Some(Value::from(clause.message())));
        }
    }

    if let Some(context) = context {
        for spec in action_type.parameters() {
            if params.contains_key(spec.name) {
                continue;
            }
            if let Some(value) = context.get(spec.name) {
                params.insert(spec.name.to_string(), value.clone());
            }
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify_text(text: &str) -> Option<ActionType> {
        classify(&Clause::new(text))
    }

    #[test]
    fn splits_on_separators() {
        let parts: Vec<String> = clauses("list payments; cancel sub_1 then notify a@b.io.\nget customer cus_9")
            .iter()
            .map(|c| c.text().to_string())
            .collect();
        assert_eq!(
            parts,
            vec!["list payments", "cancel sub_1", "notify a@b.io", "get customer cus_9"]
        );
    }

    #[test]
    fn and_then_is_one_separator() {
        let parts = clauses("list payments and then list subscriptions");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].text(), "list subscriptions");
    }

    #[test]
    fn email_dots_do_not_split() {
        let parts = clauses("create customer ada@example.com named Ada");
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn classifies_most_specific_first() {
        assert_eq!(
            classify_text("cancel subscription sub_1"),
            Some(ActionType::CancelSubscription)
        );
        assert_eq!(
            classify_text("revoke access for user_1 to res_1"),
            Some(ActionType::RevokeAccess)
        );
        assert_eq!(
            classify_text("give user_1 access to res_1"),
            Some(ActionType::GrantAccess)
        );
        assert_eq!(
            classify_text("does user_1 have access to res_1"),
            Some(ActionType::CheckAccess)
        );
        assert_eq!(
            classify_text("create a customer for ada@example.com"),
            Some(ActionType::CreateCustomer)
        );
        assert_eq!(
            classify_text("update customer cus_1 email to ada@example.com"),
            Some(ActionType::UpdateCustomer)
        );
        assert_eq!(classify_text("show customer cus_1"), Some(ActionType::GetCustomer));
        assert_eq!(classify_text("get payment pi_42"), Some(ActionType::GetPayment));
        assert_eq!(classify_text("list the last 10 payments"), Some(ActionType::ListPayments));
        assert_eq!(classify_text("show subscription sub_7"), Some(ActionType::GetSubscription));
        assert_eq!(
            classify_text("list active subscriptions"),
            Some(ActionType::ListSubscriptions)
        );
        assert_eq!(
            classify_text("notify user_1 that the server is down"),
            Some(ActionType::SendNotification)
        );
        assert_eq!(classify_text("what is the weather"), None);
    }

    #[test]
    fn infers_limit_from_count_phrases() {
        for text in ["list the last 10 payments", "top 10 payments", "10 most recent payments"] {
            let params = infer_parameters(ActionType::ListPayments, &Clause::new(text), None);
            assert_eq!(params.get("limit"), Some(&json!(10)), "{text}");
        }
    }

    #[test]
    fn clamps_limit_to_list_bounds() {
        let params =
            infer_parameters(ActionType::ListPayments, &Clause::new("list the last 200 payments"), None);
        assert_eq!(params.get("limit"), Some(&json!(MAX_LIST_LIMIT)));
        let params =
            infer_parameters(ActionType::ListSubscriptions, &Clause::new("show the first 0 subscriptions"), None);
        assert_eq!(params.get("limit"), Some(&json!(1)));
    }

    #[test]
    fn infers_identifiers_by_prefix() {
        let clause = Clause::new("grant user_7 access to prod_basic");
        let params = infer_parameters(ActionType::GrantAccess, &clause, None);
        assert_eq!(params.get("user_id"), Some(&json!("user_7")));
        assert_eq!(params.get("resource_id"), Some(&json!("prod_basic")));
    }

    #[test]
    fn cancel_reads_timing_and_reason() {
        let clause = Clause::new("cancel subscription sub_9 at period end because they asked");
        let params = infer_parameters(ActionType::CancelSubscription, &clause, None);
        assert_eq!(params.get("subscription_id"), Some(&json!("sub_9")));
        assert_eq!(params.get("at_period_end"), Some(&json!(true)));
        assert_eq!(params.get("reason"), Some(&json!("they asked")));
    }

    #[test]
    fn notification_prefers_quoted_message() {
        let clause = Clause::new(r#"notify ada@example.com "your invoice is ready""#);
        let params = infer_parameters(ActionType::SendNotification, &clause, None);
        assert_eq!(params.get("recipient"), Some(&json!("ada@example.com")));
        assert_eq!(params.get("message"), Some(&json!("your invoice is ready")));
    }

    #[test]
    fn context_fills_only_schema_gaps() {
        let mut context = Map::new();
        context.insert("customer_id".into(), json!("cus_ctx"));
        context.insert("unrelated".into(), json!(true));
        let clause = Clause::new("list payments");
        let params = infer_parameters(ActionType::ListPayments, &clause, Some(&context));
        assert_eq!(params.get("customer_id"), Some(&json!("cus_ctx")));
        assert!(!params.contains_key("unrelated"));

        let clause = Clause::new("list payments for cus_prompt");
        let params = infer_parameters(ActionType::ListPayments, &clause, Some(&context));
        assert_eq!(params.get("customer_id"), Some(&json!("cus_prompt")));
    }

    #[test]
    fn email_platform_needs_channel_wording() {
        assert_eq!(Clause::new("notify user_1 via email").platform(), Some(Platform::Email));
        assert_eq!(Clause::new("update customer email").platform(), None);
        assert_eq!(Clause::new("list stripe payments").platform(), Some(Platform::Stripe));
    }
}
