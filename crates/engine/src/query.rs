//! Read-only views over the order set for dispatch boards and dashboards.

use std::collections::BTreeMap;

use orderflow_core::{ActorId, Stage};
use orderflow_storage::{Order, OrderFilter, OrderStore};
use serde::Serialize;

use crate::engine::WorkflowEngine;
use crate::error::WorkflowError;

/// Order counts per stage. Every stage of the table is present, zero or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub counts: BTreeMap<Stage, usize>,
    pub total: usize,
}

impl StageSummary {
    pub fn count(&self, stage: Stage) -> usize {
        self.counts.get(&stage).copied().unwrap_or(0)
    }
}

impl<S: OrderStore> WorkflowEngine<S> {
    /// Orders waiting at `READY_FOR_PICKUP` that no agent has claimed,
    /// oldest first.
    pub async fn available_for_pickup(&self) -> Result<Vec<Order>, WorkflowError> {
        let filter = OrderFilter {
            stage: Some(Stage::ReadyForPickup),
            unassigned: true,
            ..Default::default()
        };
        Ok(self.store().list_orders(&filter).await?)
    }

    /// Orders claimed by `agent`, in any stage.
    pub async fn assigned_to(&self, agent: ActorId) -> Result<Vec<Order>, WorkflowError> {
        let filter = OrderFilter {
            assigned_agent: Some(agent),
            ..Default::default()
        };
        Ok(self.store().list_orders(&filter).await?)
    }

    pub async fn orders_for_restaurant(
        &self,
        restaurant_id: u64,
        stage: Option<Stage>,
    ) -> Result<Vec<Order>, WorkflowError> {
        let filter = OrderFilter {
            restaurant_id: Some(restaurant_id),
            stage,
            ..Default::default()
        };
        Ok(self.store().list_orders(&filter).await?)
    }

    pub async fn orders_for_customer(&self, customer_id: ActorId) -> Result<Vec<Order>, WorkflowError> {
        let filter = OrderFilter {
            customer_id: Some(customer_id),
            ..Default::default()
        };
        Ok(self.store().list_orders(&filter).await?)
    }

    /// Count the orders matching `filter` by stage.
    pub async fn stage_summary(&self, filter: &OrderFilter) -> Result<StageSummary, WorkflowError> {
        let orders = self.store().list_orders(filter).await?;
        let mut counts: BTreeMap<Stage, usize> = self.table().stages().map(|s| (s, 0)).collect();
        for order in &orders {
            *counts.entry(order.stage).or_insert(0) += 1;
        }
        Ok(StageSummary {
            counts,
            total: orders.len(),
        })
    }
}
