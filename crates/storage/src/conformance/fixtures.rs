//! Record constructors with sensible defaults, shared by the conformance
//! categories and by backend crates writing their own tests.

use orderflow_core::{ActorId, ActorRole, OrderId, Stage};

use crate::record::{Order, RecordKind, StageChangeRecord, StageUpdate};

pub const FIXED_TIME: &str = "2025-01-01T00:00:00Z";

/// A new order at the initial stage and its creation record.
pub fn new_order(id: u64) -> (Order, StageChangeRecord) {
    new_order_at(id, Stage::INITIAL)
}

/// A new order created directly at `stage`.
///
/// Stores do not consult the transition table, so any stage is accepted.
pub fn new_order_at(id: u64, stage: Stage) -> (Order, StageChangeRecord) {
    let order = Order {
        id: OrderId(id),
        stage,
        assigned_agent: None,
        customer_id: Some(ActorId(100 + id)),
        restaurant_id: Some(1),
        version: 0,
        created_at: FIXED_TIME.to_string(),
        updated_at: FIXED_TIME.to_string(),
    };
    let creation = StageChangeRecord {
        sequence: 0,
        order_id: OrderId(id),
        from_stage: None,
        to_stage: stage,
        actor_id: Some(ActorId(100 + id)),
        actor_role: Some(ActorRole::Customer),
        kind: RecordKind::Created,
        note: Some("order placed".to_string()),
        recorded_at: FIXED_TIME.to_string(),
    };
    (order, creation)
}

/// A plain (non-assigning) conditional update.
pub fn update(id: u64, from: Stage, expected_version: i64, to: Stage) -> StageUpdate {
    StageUpdate {
        order_id: OrderId(id),
        expected_stage: from,
        expected_version,
        new_stage: to,
        assign_if_unset: None,
    }
}

/// `READY_FOR_PICKUP -> PICKED_UP`, assigning `agent`.
pub fn claim(id: u64, expected_version: i64, agent: u64) -> StageUpdate {
    StageUpdate {
        assign_if_unset: Some(ActorId(agent)),
        ..update(id, Stage::ReadyForPickup, expected_version, Stage::PickedUp)
    }
}

/// The workflow record matching `update`.
pub fn record_for(update: &StageUpdate, role: ActorRole, actor: u64) -> StageChangeRecord {
    StageChangeRecord {
        sequence: 0,
        order_id: update.order_id,
        from_stage: Some(update.expected_stage),
        to_stage: update.new_stage,
        actor_id: Some(ActorId(actor)),
        actor_role: Some(role),
        kind: RecordKind::Workflow,
        note: None,
        recorded_at: FIXED_TIME.to_string(),
    }
}
