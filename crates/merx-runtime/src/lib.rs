//! Merx Runtime
//!
//! Executes validated plans against platform connectors.
//!
//! - [`ConnectorRegistry`]: one [`Connector`] per platform, last registration wins.
//! - [`ExecutionEngine`]: re-validates, groups by platform, dispatches with
//!   per-action isolation and an overall timeout budget, and returns results
//!   in plan order.
//! - [`FallbackConnector`]: deterministic synthetic responses, no I/O.
//! - [`IdempotencyStore`]: holds a key while its action runs and replays the
//!   stored result instead of repeating it.
//! - [`AuditSink`]: receives one event per action and per execution.

pub mod audit;
pub mod connector;
pub mod engine;
pub mod fallback;
pub mod idempotency;
pub mod registry;

pub use audit::{AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use connector::{Connector, ConnectorError, ConnectorMetadata, HealthStatus};
pub use engine::ExecutionEngine;
pub use fallback::FallbackConnector;
pub use idempotency::{IdempotencyCheck, IdempotencyStore, Reservation};
pub use registry::ConnectorRegistry;
