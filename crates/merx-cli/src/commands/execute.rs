//! `merx execute` and `merx run`.

use anyhow::{Context, Result};
use merx_core::{ExecutionMode, ExecutionRequest, ExecutionResponse, MerxConfig, PlanResponse};
use merx_planner::Planner;
use merx_runtime::{ConnectorRegistry, ExecutionEngine};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{print_json, read_plan};
use crate::{EngineArgs, IntentArgs};

async fn build_engine(config: &MerxConfig, args: &EngineArgs) -> Result<ExecutionEngine> {
    let registry = ConnectorRegistry::from_config(config)
        .await
        .context("Failed to initialize connectors")?;

    let mut engine = ExecutionEngine::from_config(Arc::new(registry), &config.execution);
    if args.concurrent {
        engine = engine.with_mode(ExecutionMode::Concurrent);
    }
    if let Some(ms) = args.timeout_ms {
        anyhow::ensure!(ms > 0, "--timeout-ms must be greater than zero");
        engine = engine.with_timeout(Duration::from_millis(ms));
    }
    Ok(engine)
}

pub async fn execute(config: &MerxConfig, file: &Path, args: &EngineArgs) -> Result<bool> {
    let request = ExecutionRequest {
        plan: read_plan(file)?,
    };
    let engine = build_engine(config, args).await?;
    let response = engine.execute_request(&request).await;
    print_json(&response)?;
    Ok(response.success)
}

pub async fn run(config: &MerxConfig, intent: &IntentArgs, args: &EngineArgs) -> Result<bool> {
    let planner = Planner::from_config(config);
    let plan = match planner.plan_from_prompt(&intent.intent()).await {
        Ok(plan) => plan,
        Err(err) => {
            print_json(&json!({ "plan": PlanResponse::from(err) }))?;
            return Ok(false);
        }
    };

    let engine = build_engine(config, args).await?;
    let execution = ExecutionResponse::from(engine.execute(&plan).await);
    let success = execution.success;
    print_json(&json!({
        "plan": PlanResponse::accepted(plan),
        "execution": execution,
    }))?;
    Ok(success)
}
