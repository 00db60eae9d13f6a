use std::collections::BTreeSet;
use std::fmt;

use orderflow_core::{describe_stages, ActorId, ActorRole, OrderId, Stage, TransitionDenied};
use orderflow_storage::StorageError;
use serde::Serialize;

/// Why a commit lost against another writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictReason {
    /// Another agent holds the assignment this request tried to take.
    AlreadyClaimed { by: ActorId },
    /// The order changed between read and commit.
    StaleState,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::AlreadyClaimed { by } => write!(f, "already claimed by {}", by),
            ConflictReason::StaleState => write!(f, "order changed since it was read"),
        }
    }
}

/// Errors returned by [`WorkflowEngine`](crate::WorkflowEngine) operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("order not found: {order_id}")]
    NotFound { order_id: OrderId },

    #[error(
        "invalid transition for {order_id}: {current} -> {attempted} is not allowed for role \
         '{role}'; valid transitions from {current} are: {legal}",
        legal = describe_stages(.legal_next)
    )]
    InvalidTransition {
        order_id: OrderId,
        current: Stage,
        attempted: Stage,
        role: ActorRole,
        legal_next: BTreeSet<Stage>,
    },

    #[error("conflict on {order_id}: {reason}")]
    Conflict {
        order_id: OrderId,
        reason: ConflictReason,
    },

    #[error(
        "forbidden: {actor_id} is not the agent assigned to {order_id} (assigned: {assigned})",
        assigned = describe_agent(.assigned_agent)
    )]
    Forbidden {
        order_id: OrderId,
        actor_id: ActorId,
        assigned_agent: Option<ActorId>,
    },

    #[error("order already exists: {order_id}")]
    AlreadyExists { order_id: OrderId },

    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl WorkflowError {
    pub(crate) fn invalid_transition(order_id: OrderId, denied: TransitionDenied) -> Self {
        WorkflowError::InvalidTransition {
            order_id,
            current: denied.current,
            attempted: denied.attempted,
            role: denied.role,
            legal_next: denied.legal_next,
        }
    }

    /// Only conflicts may succeed on a fresh attempt; every other error is
    /// deterministic for the same order state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::Conflict { .. })
    }

    /// Stable snake_case name of the variant, for machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::InvalidTransition { .. } => "invalid_transition",
            WorkflowError::Conflict { .. } => "conflict",
            WorkflowError::Forbidden { .. } => "forbidden",
            WorkflowError::AlreadyExists { .. } => "already_exists",
            WorkflowError::Storage(_) => "storage",
        }
    }
}

impl From<StorageError> for WorkflowError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::OrderNotFound { order_id } => WorkflowError::NotFound { order_id },
            StorageError::AlreadyExists { order_id } => WorkflowError::AlreadyExists { order_id },
            StorageError::ConcurrentConflict { order_id, .. } => WorkflowError::Conflict {
                order_id,
                reason: ConflictReason::StaleState,
            },
            other => WorkflowError::Storage(other),
        }
    }
}

fn describe_agent(agent: &Option<ActorId>) -> String {
    match agent {
        Some(a) => a.to_string(),
        None => "nobody".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_terminal_stage() {
        let err = WorkflowError::InvalidTransition {
            order_id: OrderId(3),
            current: Stage::Cancelled,
            attempted: Stage::PickedUp,
            role: ActorRole::Driver,
            legal_next: BTreeSet::new(),
        };
        let msg = err.to_string();
        assert!(msg.contains("CANCELLED -> PICKED_UP"), "{msg}");
        assert!(msg.contains("'driver'"), "{msg}");
        assert!(msg.ends_with("none (terminal stage)"), "{msg}");
    }

    #[test]
    fn invalid_transition_lists_alternatives() {
        let err = WorkflowError::InvalidTransition {
            order_id: OrderId(3),
            current: Stage::Placed,
            attempted: Stage::Delivered,
            role: ActorRole::Customer,
            legal_next: [Stage::Confirmed, Stage::Cancelled].into_iter().collect(),
        };
        assert!(err.to_string().ends_with("CONFIRMED, CANCELLED"));
    }

    #[test]
    fn only_conflicts_are_retryable() {
        let conflict = WorkflowError::Conflict {
            order_id: OrderId(1),
            reason: ConflictReason::StaleState,
        };
        assert!(conflict.is_retryable());
        assert!(!WorkflowError::NotFound { order_id: OrderId(1) }.is_retryable());
        assert!(!WorkflowError::Forbidden {
            order_id: OrderId(1),
            actor_id: ActorId(2),
            assigned_agent: Some(ActorId(3)),
        }
        .is_retryable());
    }

    #[test]
    fn storage_errors_map_to_workflow_variants() {
        let e: WorkflowError = StorageError::OrderNotFound { order_id: OrderId(9) }.into();
        assert!(matches!(e, WorkflowError::NotFound { order_id } if order_id == OrderId(9)));

        let e: WorkflowError = StorageError::ConcurrentConflict {
            order_id: OrderId(9),
            expected_stage: Stage::Placed,
            expected_version: 0,
            found_stage: Stage::Confirmed,
            found_version: 1,
            already_assigned: false,
        }
        .into();
        assert!(matches!(
            e,
            WorkflowError::Conflict {
                reason: ConflictReason::StaleState,
                ..
            }
        ));

        let e: WorkflowError = StorageError::Backend("disk full".into()).into();
        assert_eq!(e.kind(), "storage");
    }

    #[test]
    fn forbidden_names_the_assignee() {
        let err = WorkflowError::Forbidden {
            order_id: OrderId(1),
            actor_id: ActorId(7),
            assigned_agent: Some(ActorId(5)),
        };
        assert_eq!(
            err.to_string(),
            "forbidden: actor-7 is not the agent assigned to order-1 (assigned: actor-5)"
        );
    }

    #[test]
    fn conflict_reason_serializes_tagged() {
        let json = serde_json::to_value(ConflictReason::AlreadyClaimed { by: ActorId(4) }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "already_claimed", "by": 4}));
    }
}
