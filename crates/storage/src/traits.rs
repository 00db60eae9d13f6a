use async_trait::async_trait;
use orderflow_core::OrderId;

use crate::error::StorageError;
use crate::record::{Order, OrderFilter, StageChangeRecord, StageUpdate};

/// The storage trait for orderflow backends.
///
/// An `OrderStore` holds the workflow-owned fields of every order together
/// with its append-only audit log.
///
/// ## Atomic Commit
///
/// `insert_order` and `commit_transition` each write an order change and its
/// audit record as one unit: either both become visible or neither does.
/// A SQL backend implements `commit_transition` as one transaction holding
/// `UPDATE ... WHERE stage = $expected AND version = $version
/// [AND assigned_agent IS NULL]` followed by the record `INSERT`; zero rows
/// updated means `ConcurrentConflict` and a rollback.
///
/// ## Append-only Audit
///
/// No operation updates or deletes an audit record. `history` returns
/// records in commit order, numbered `1..=n` by `sequence`.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a single store can be
/// shared across concurrently running request tasks.
#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    /// Insert a new order at version 0 together with its creation record.
    ///
    /// The record must have no `from_stage` and its `to_stage` must equal
    /// `order.stage`, otherwise `InvalidRecord`. Returns the stored order and
    /// the record with its sequence assigned.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the id is taken.
    async fn insert_order(
        &self,
        order: Order,
        creation: StageChangeRecord,
    ) -> Result<(Order, StageChangeRecord), StorageError>;

    /// Read an order's current state.
    ///
    /// Returns `Err(StorageError::OrderNotFound)` if the order does not exist.
    async fn get_order(&self, order_id: OrderId) -> Result<Order, StorageError>;

    /// Apply a conditional stage update and append its audit record.
    ///
    /// The record's `order_id`, `from_stage` and `to_stage` must match the
    /// update, otherwise `InvalidRecord`. If the guard in [`StageUpdate`]
    /// does not hold, returns `Err(StorageError::ConcurrentConflict)` and
    /// writes nothing.
    async fn commit_transition(
        &self,
        update: StageUpdate,
        record: StageChangeRecord,
    ) -> Result<(Order, StageChangeRecord), StorageError>;

    /// Full audit history of an order, in commit order.
    ///
    /// Returns `Err(StorageError::OrderNotFound)` if the order does not exist.
    async fn history(&self, order_id: OrderId) -> Result<Vec<StageChangeRecord>, StorageError>;

    /// Orders matching `filter`, ascending by id.
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StorageError>;
}
