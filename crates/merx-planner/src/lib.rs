//! Merx Planner
//!
//! Compiles natural-language intents into plans and admits only plans that
//! pass structural validation and every policy gate.
//!
//! ```text
//! Intent ──▶ Compiler ──▶ PlanDraft ──▶ Validator ──▶ Plan ──▶ PolicyPipeline ──▶ Plan
//! ```
//!
//! The [`Compiler`] seam is async so a language-model compiler can replace
//! [`RuleCompiler`] without touching validation or gating.

pub mod compiler;
pub mod error;
pub mod planner;
mod rules;

pub use compiler::{Compiler, RuleCompiler};
pub use error::PlanningError;
pub use planner::Planner;
