//! `merx check-config` command implementation.
//!
//! Loads the configuration and reports findings by severity:
//! - load and semantic errors from [`MerxConfig::validate`]
//! - settings that are valid but will not behave as the operator expects

use anyhow::Result;
use merx_core::{ConnectorMode, MerxConfig};
use std::fmt;
use std::path::{Path, PathBuf};

use super::DEFAULT_CONFIG_FILE;

/// Severity level for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    pub message: String,
    /// Dotted path of the offending setting (e.g. "connectors.stripe").
    pub location: Option<String>,
}

impl CheckFinding {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for CheckFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "[{}] {}: {}", self.severity, location, self.message),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

/// Findings for a configuration that loaded successfully.
pub fn review(config: &MerxConfig) -> Vec<CheckFinding> {
    let mut findings = Vec::new();

    let defaults = &config.planner.default_constraints;
    if defaults.allowed_platforms.as_ref().is_some_and(Vec::is_empty) {
        findings.push(
            CheckFinding::warning("empty allow-list: every plan will be rejected")
                .at("planner.default_constraints.allowedPlatforms"),
        );
    }

    if !config.policy.include_default_combinations {
        findings.push(
            CheckFinding::warning("grant/revoke on the same target is no longer rejected")
                .at("policy.include_default_combinations"),
        );
    }

    if !config.connectors.is_empty()
        && !config.connectors.contains_key(&config.planner.default_platform)
    {
        findings.push(
            CheckFinding::warning(format!(
                "default platform '{}' has no connector; its actions will fail as unregistered",
                config.planner.default_platform
            ))
            .at("connectors"),
        );
    }

    for (platform, connector) in &config.connectors {
        if connector.mode != ConnectorMode::Live {
            continue;
        }
        let location = format!("connectors.{platform}");
        if connector.credential().is_none() {
            findings.push(
                CheckFinding::warning(format!(
                    "{} is not set; the connector will run in fallback mode",
                    connector.credentials_env.as_deref().unwrap_or("credentials_env")
                ))
                .at(location),
            );
        } else {
            findings.push(
                CheckFinding::info("live mode requested; no live connector is built in, fallback is used")
                    .at(location),
            );
        }
    }

    findings.push(CheckFinding::info(format!(
        "execution: {:?} mode, {} ms budget",
        config.execution.mode, config.execution.timeout_ms
    )));

    findings
}

fn print_summary(source: &str, findings: &[CheckFinding]) {
    println!("Checking Merx configuration ({source})");
    for severity in [Severity::Error, Severity::Warning, Severity::Info] {
        for finding in findings.iter().filter(|f| f.severity == severity) {
            println!("  {finding}");
        }
    }

    let errors = findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .count();
    if errors == 0 {
        println!("Configuration OK");
    } else {
        println!("Configuration has {errors} error(s)");
    }
}

pub fn run(path: Option<&Path>) -> Result<bool> {
    let path: Option<PathBuf> = path
        .map(Path::to_path_buf)
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()));

    let (source, loaded) = match &path {
        Some(path) => (path.display().to_string(), MerxConfig::from_file(path)),
        None => ("defaults".to_string(), Ok(MerxConfig::default())),
    };

    let findings = match loaded {
        Ok(config) => review(&config),
        Err(err) => vec![CheckFinding::error(err.to_string())],
    };

    print_summary(&source, &findings);
    Ok(findings.iter().all(|f| f.severity != Severity::Error))
}
