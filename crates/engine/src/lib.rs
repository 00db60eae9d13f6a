//! orderflow-engine: the only path by which an order's stage changes.
//!
//! [`WorkflowEngine`] validates each request against the shared
//! [`TransitionTable`](orderflow_core::TransitionTable), enforces claim and
//! assignee rules, and commits the stage change together with its audit
//! record through an [`OrderStore`](orderflow_storage::OrderStore).
//! [`audit::verify_history`] replays a stored log to prove it consistent.

pub mod audit;
mod engine;
mod error;
mod query;
mod request;

pub use audit::{verify_history, AuditSummary, AuditViolation};
pub use engine::{EngineOptions, WorkflowEngine, DEFAULT_OVERRIDE_PREFIX};
pub use error::{ConflictReason, WorkflowError};
pub use query::StageSummary;
pub use request::{NewOrder, OverrideRequest, TransitionOutcome, TransitionRequest};
