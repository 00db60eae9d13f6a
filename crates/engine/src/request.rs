//! Request and outcome types for the engine's entry points.
//!
//! All of them deserialize from the same field names they carry, so a
//! caller can build them from JSON as easily as from code.

use orderflow_core::{ActorId, ActorRole, OrderId, Stage};
use orderflow_storage::{Order, StageChangeRecord};
use serde::{Deserialize, Serialize};

/// A request to move an order along the normal workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionRequest {
    pub order_id: OrderId,
    pub actor_role: ActorRole,
    pub actor_id: ActorId,
    pub desired_stage: Stage,
    #[serde(default)]
    pub note: Option<String>,
}

impl TransitionRequest {
    pub fn new(order_id: OrderId, actor_role: ActorRole, actor_id: ActorId, desired_stage: Stage) -> Self {
        TransitionRequest {
            order_id,
            actor_role,
            actor_id,
            desired_stage,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// An administrative stage change that bypasses the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideRequest {
    pub order_id: OrderId,
    pub admin_id: ActorId,
    pub target_stage: Stage,
    pub reason: String,
}

/// A new order handed over by the ordering subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewOrder {
    pub order_id: OrderId,
    #[serde(default)]
    pub customer_id: Option<ActorId>,
    #[serde(default)]
    pub restaurant_id: Option<u64>,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewOrder {
    pub fn new(order_id: OrderId) -> Self {
        NewOrder {
            order_id,
            customer_id: None,
            restaurant_id: None,
            note: None,
        }
    }

    pub fn customer(mut self, customer_id: ActorId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn restaurant(mut self, restaurant_id: u64) -> Self {
        self.restaurant_id = Some(restaurant_id);
        self
    }
}

/// Result of a committed transition or override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub order_id: OrderId,
    pub previous_stage: Stage,
    pub new_stage: Stage,
    pub assigned_agent: Option<ActorId>,
    /// Sequence number of the audit record written by the commit.
    pub sequence: u64,
}

impl TransitionOutcome {
    pub(crate) fn committed(order: &Order, record: &StageChangeRecord) -> Self {
        TransitionOutcome {
            order_id: order.id,
            previous_stage: record.from_stage.unwrap_or(record.to_stage),
            new_stage: order.stage,
            assigned_agent: order.assigned_agent,
            sequence: record.sequence,
        }
    }
}
