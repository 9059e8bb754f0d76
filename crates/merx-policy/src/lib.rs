//! Merx Policy Gates
//!
//! Policy gates decide whether a structurally valid plan may be executed.
//! Each gate is a named, pure predicate `(Plan, Constraints) -> Result<(), PolicyError>`;
//! the [`PolicyPipeline`] runs them in a fixed order and stops at the first
//! rejection so the error names exactly one gate.
//!
//! | Gate | Rejects when |
//! |------|--------------|
//! | `size` | the plan has more actions than `maxActions` |
//! | `platform_allow_list` | an action targets a platform outside `allowedPlatforms` |
//! | `forbidden_combination` | two actions form a configured unsafe pairing |

pub mod combination;
pub mod error;
pub mod gates;
pub mod pipeline;

pub use combination::ForbiddenCombination;
pub use error::{PolicyError, PolicyErrorKind};
pub use gates::{ForbiddenCombinationGate, PlatformAllowListGate, PolicyGate, SizeGate};
pub use pipeline::PolicyPipeline;
