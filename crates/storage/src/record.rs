use orderflow_core::{ActorId, ActorRole, OrderId, Stage};
use serde::{Deserialize, Serialize};

/// An order's workflow-owned fields as stored in the backend.
///
/// Items, pricing and address belong to the ordering subsystem and are not
/// modelled here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub stage: Stage,
    /// Delivery agent who claimed the order. Set once, never cleared.
    pub assigned_agent: Option<ActorId>,
    pub customer_id: Option<ActorId>,
    pub restaurant_id: Option<u64>,
    /// Commit counter: 0 at creation, +1 per committed stage change.
    pub version: i64,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
}

/// What produced an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// The creation event. Always the first record of an order.
    Created,
    /// A transition validated against the transition table.
    Workflow,
    /// An administrative override that bypassed the transition table.
    Override,
}

/// One immutable audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChangeRecord {
    /// 1-based position in the order's history. Assigned by the store at
    /// commit; any value supplied by the caller is overwritten.
    pub sequence: u64,
    pub order_id: OrderId,
    /// Absent on the creation record.
    pub from_stage: Option<Stage>,
    pub to_stage: Stage,
    /// Absent for system-initiated actions.
    pub actor_id: Option<ActorId>,
    pub actor_role: Option<ActorRole>,
    pub kind: RecordKind,
    pub note: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub recorded_at: String,
}

/// A conditional (compare-and-set) stage update.
///
/// The store applies it only if the order is still at `expected_stage` and
/// `expected_version`, and, when `assign_if_unset` is given, only if no agent
/// is assigned yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageUpdate {
    pub order_id: OrderId,
    pub expected_stage: Stage,
    pub expected_version: i64,
    pub new_stage: Stage,
    pub assign_if_unset: Option<ActorId>,
}

/// Query filter for `OrderStore::list_orders`. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub stage: Option<Stage>,
    pub assigned_agent: Option<ActorId>,
    /// Only orders with no assigned agent.
    pub unassigned: bool,
    pub customer_id: Option<ActorId>,
    pub restaurant_id: Option<u64>,
}

impl OrderFilter {
    pub fn at_stage(stage: Stage) -> Self {
        OrderFilter {
            stage: Some(stage),
            ..Default::default()
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.stage.map_or(true, |s| order.stage == s)
            && self
                .assigned_agent
                .map_or(true, |a| order.assigned_agent == Some(a))
            && (!self.unassigned || order.assigned_agent.is_none())
            && self
                .customer_id
                .map_or(true, |c| order.customer_id == Some(c))
            && self
                .restaurant_id
                .map_or(true, |r| order.restaurant_id == Some(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::fixtures::{new_order_at, FIXED_TIME};

    #[test]
    fn record_wire_form() {
        let (_, creation) = new_order_at(3, Stage::ReadyForPickup);
        let json = serde_json::to_value(&creation).unwrap();
        assert_eq!(json["order_id"], 3);
        assert_eq!(json["from_stage"], serde_json::Value::Null);
        assert_eq!(json["to_stage"], "READY_FOR_PICKUP");
        assert_eq!(json["actor_role"], "customer");
        assert_eq!(json["kind"], "created");
        assert_eq!(json["recorded_at"], FIXED_TIME);

        let back: StageChangeRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, creation);
    }

    #[test]
    fn filter_fields_combine() {
        let (mut order, _) = new_order_at(1, Stage::PickedUp);
        order.assigned_agent = Some(ActorId(9));

        assert!(OrderFilter::default().matches(&order));
        assert!(OrderFilter::at_stage(Stage::PickedUp).matches(&order));
        assert!(!OrderFilter::at_stage(Stage::Placed).matches(&order));

        let unassigned = OrderFilter {
            unassigned: true,
            ..Default::default()
        };
        assert!(!unassigned.matches(&order));

        let mine = OrderFilter {
            stage: Some(Stage::PickedUp),
            assigned_agent: Some(ActorId(9)),
            restaurant_id: Some(1),
            ..Default::default()
        };
        assert!(mine.matches(&order));
        let other_restaurant = OrderFilter {
            restaurant_id: Some(2),
            ..mine
        };
        assert!(!other_restaurant.matches(&order));
    }
}
