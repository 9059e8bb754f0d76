//! Subcommand implementations for the `merx` binary.
//!
//! Commands that produce data print JSON to stdout. Each returns whether the
//! operation succeeded; `main` turns that into the exit code.

pub mod check;
pub mod execute;
pub mod inspect;
pub mod plan;

use anyhow::{Context, Result};
use merx_core::{MerxConfig, PlanDraft};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "merx.yaml";

/// Load the configuration from `path`, else `./merx.yaml` if present, else
/// use the defaults.
pub fn load_config(path: Option<&Path>) -> Result<MerxConfig> {
    match path {
        Some(path) => MerxConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            MerxConfig::from_file(DEFAULT_CONFIG_FILE)
                .with_context(|| format!("Failed to load configuration from {DEFAULT_CONFIG_FILE}"))
        }
        None => {
            tracing::debug!("No configuration file, using defaults");
            Ok(MerxConfig::default())
        }
    }
}

/// Read a plan from a JSON file.
///
/// Accepts a bare plan, an execution request (`{"plan": ...}`) or the output
/// of `merx plan`, so the commands can be chained through files.
pub fn read_plan(path: &Path) -> Result<PlanDraft> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read plan file {:?}", path))?;
    parse_plan(&content).with_context(|| format!("Failed to parse plan file {:?}", path))
}

fn parse_plan(content: &str) -> Result<PlanDraft> {
    let Value::Object(mut object) = serde_json::from_str::<Value>(content)? else {
        anyhow::bail!("expected a JSON object");
    };
    let plan = match object.remove("plan") {
        Some(plan @ Value::Object(_)) => plan,
        Some(other) => {
            object.insert("plan".to_string(), other);
            Value::Object(object)
        }
        None => Value::Object(object),
    };
    Ok(serde_json::from_value(plan)?)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BARE: &str = r#"{"id":"p1","actions":[{"platform":"whop","type":"list_payments","parameters":{"limit":5}}]}"#;

    #[test]
    fn reads_bare_plan() {
        let draft = parse_plan(BARE).unwrap();
        assert_eq!(draft.id, "p1");
        assert_eq!(draft.actions.len(), 1);
        assert_eq!(draft.vocabulary_version, None);
    }

    #[test]
    fn reads_wrapped_plan() {
        let wrapped = format!(r#"{{"success":true,"plan":{BARE}}}"#);
        assert_eq!(parse_plan(&wrapped).unwrap().id, "p1");
    }

    #[test]
    fn rejects_non_object() {
        assert!(parse_plan("[1, 2]").is_err());
        assert!(parse_plan("not json").is_err());
    }

    #[test]
    fn reads_plan_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{BARE}").unwrap();
        assert_eq!(read_plan(file.path()).unwrap().actions.len(), 1);
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.yaml"))).is_err());
    }

    #[test]
    fn loads_explicit_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "execution:\n  mode: concurrent").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.execution.mode, merx_core::ExecutionMode::Concurrent);
    }
}
