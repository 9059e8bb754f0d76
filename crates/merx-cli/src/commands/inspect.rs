//! `merx connectors` and `merx vocabulary`.

use anyhow::{Context, Result};
use merx_core::{ActionType, MerxConfig, Platform, VOCABULARY_VERSION};
use merx_runtime::ConnectorRegistry;
use serde_json::{Value, json};

use super::print_json;

pub async fn connectors(config: &MerxConfig) -> Result<bool> {
    let registry = ConnectorRegistry::from_config(config)
        .await
        .context("Failed to initialize connectors")?;
    let health = registry.health_check_all().await;

    let entries: Vec<Value> = registry
        .metadata()
        .into_iter()
        .map(|metadata| {
            json!({
                "health": health.get(&metadata.platform),
                "connector": metadata,
            })
        })
        .collect();

    print_json(&entries)?;
    Ok(health.values().all(|status| status.healthy))
}

pub fn vocabulary() -> Result<bool> {
    print_json(&vocabulary_document())?;
    Ok(true)
}

fn vocabulary_document() -> Value {
    let action_types: Vec<Value> = ActionType::ALL
        .iter()
        .map(|action_type| {
            json!({
                "type": action_type,
                "mutating": action_type.is_mutating(),
                "parameters": action_type.parameters(),
            })
        })
        .collect();

    json!({
        "version": VOCABULARY_VERSION,
        "platforms": Platform::ALL,
        "actionTypes": action_types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_lists_every_member() {
        let doc = vocabulary_document();
        assert_eq!(doc["version"], VOCABULARY_VERSION);
        assert_eq!(doc["platforms"].as_array().unwrap().len(), Platform::ALL.len());

        let types = doc["actionTypes"].as_array().unwrap();
        assert_eq!(types.len(), ActionType::ALL.len());

        let grant = types.iter().find(|t| t["type"] == "grant_access").unwrap();
        assert_eq!(grant["mutating"], true);
        let names: Vec<&str> = grant["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["user_id", "resource_id", "expires_at"]);
    }
}
