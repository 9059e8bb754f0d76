//! `merx plan` and `merx validate`.

use anyhow::Result;
use merx_core::{Constraints, MerxConfig};
use merx_planner::Planner;
use std::path::Path;

use super::{print_json, read_plan};
use crate::IntentArgs;

pub async fn plan(config: &MerxConfig, args: &IntentArgs) -> Result<bool> {
    let planner = Planner::from_config(config);
    let response = planner.generate(&args.intent()).await;
    print_json(&response)?;
    Ok(response.success)
}

pub fn validate(config: &MerxConfig, file: &Path, constraints: &Constraints) -> Result<bool> {
    let draft = read_plan(file)?;
    let response = Planner::from_config(config).review(&draft, constraints);
    print_json(&response)?;
    Ok(response.success)
}
