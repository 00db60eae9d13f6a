//! In-memory implementation of `OrderStore`.
//!
//! Orders and audit logs live in ordered maps behind one `RwLock`. Every
//! mutating call performs its check, update and append while holding the
//! write guard, which makes each call one atomic unit. All state is lost on
//! drop.

use std::collections::BTreeMap;

use async_trait::async_trait;
use orderflow_core::OrderId;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::{Order, OrderFilter, RecordKind, StageChangeRecord, StageUpdate};
use crate::traits::OrderStore;

#[derive(Default)]
struct MemoryInner {
    orders: BTreeMap<OrderId, Order>,
    logs: BTreeMap<OrderId, Vec<StageChangeRecord>>,
}

/// In-memory order store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of orders held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.orders.is_empty()
    }
}

fn invalid(order_id: OrderId, reason: impl Into<String>) -> StorageError {
    StorageError::InvalidRecord {
        order_id,
        reason: reason.into(),
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(
        &self,
        mut order: Order,
        mut creation: StageChangeRecord,
    ) -> Result<(Order, StageChangeRecord), StorageError> {
        if creation.order_id != order.id {
            return Err(invalid(order.id, "creation record targets another order"));
        }
        if creation.from_stage.is_some() || creation.to_stage != order.stage {
            return Err(invalid(
                order.id,
                format!(
                    "creation record must enter {} from no stage",
                    order.stage
                ),
            ));
        }
        if creation.kind != RecordKind::Created {
            return Err(invalid(order.id, "first record must be a creation record"));
        }

        let mut inner = self.inner.write().await;
        if inner.orders.contains_key(&order.id) {
            return Err(StorageError::AlreadyExists { order_id: order.id });
        }

        order.version = 0;
        creation.sequence = 1;
        inner.orders.insert(order.id, order.clone());
        inner.logs.insert(order.id, vec![creation.clone()]);
        Ok((order, creation))
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Order, StorageError> {
        let inner = self.inner.read().await;
        inner
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(StorageError::OrderNotFound { order_id })
    }

    async fn commit_transition(
        &self,
        update: StageUpdate,
        mut record: StageChangeRecord,
    ) -> Result<(Order, StageChangeRecord), StorageError> {
        let order_id = update.order_id;
        if record.order_id != order_id {
            return Err(invalid(order_id, "record targets another order"));
        }
        if record.from_stage != Some(update.expected_stage) || record.to_stage != update.new_stage
        {
            return Err(invalid(
                order_id,
                format!(
                    "record does not describe {} -> {}",
                    update.expected_stage, update.new_stage
                ),
            ));
        }
        if record.kind == RecordKind::Created {
            return Err(invalid(order_id, "creation record cannot be committed as a transition"));
        }

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or(StorageError::OrderNotFound { order_id })?;

        let already_assigned = update.assign_if_unset.is_some() && order.assigned_agent.is_some();
        if order.stage != update.expected_stage
            || order.version != update.expected_version
            || already_assigned
        {
            return Err(StorageError::ConcurrentConflict {
                order_id,
                expected_stage: update.expected_stage,
                expected_version: update.expected_version,
                found_stage: order.stage,
                found_version: order.version,
                already_assigned,
            });
        }

        order.stage = update.new_stage;
        order.version += 1;
        if let Some(agent) = update.assign_if_unset {
            order.assigned_agent = Some(agent);
        }
        order.updated_at = record.recorded_at.clone();

        let log = inner.logs.entry(order_id).or_default();
        record.sequence = log.len() as u64 + 1;
        log.push(record.clone());

        Ok((order.clone(), record))
    }

    async fn history(&self, order_id: OrderId) -> Result<Vec<StageChangeRecord>, StorageError> {
        let inner = self.inner.read().await;
        if !inner.orders.contains_key(&order_id) {
            return Err(StorageError::OrderNotFound { order_id });
        }
        Ok(inner.logs.get(&order_id).cloned().unwrap_or_default())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::run_conformance_suite;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn memory_store_passes_conformance_suite() {
        let report = run_conformance_suite(|| async { MemoryStore::new() }).await;
        assert!(report.failed == 0, "{report}");
        assert!(report.total > 20);
    }

    #[tokio::test]
    async fn len_tracks_inserted_orders() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);
        let (order, creation) = crate::conformance::fixtures::new_order(7);
        store.insert_order(order, creation).await.unwrap();
        assert_eq!(store.len().await, 1);
    }
}
