use orderflow_core::{OrderId, Stage};

/// All errors that can be returned by an `OrderStore` implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The conditional update found the order in a different state than
    /// the caller validated against. Nothing was written.
    #[error(
        "concurrent conflict on {order_id}: expected {expected_stage} at version {expected_version}, \
         found {found_stage} at version {found_version} (already assigned: {already_assigned})"
    )]
    ConcurrentConflict {
        order_id: OrderId,
        expected_stage: Stage,
        expected_version: i64,
        found_stage: Stage,
        found_version: i64,
        /// The update asked to assign the order, but it was already assigned.
        already_assigned: bool,
    },

    /// No order with the given id.
    #[error("order not found: {order_id}")]
    OrderNotFound { order_id: OrderId },

    /// An order with this id already exists.
    #[error("order already exists: {order_id}")]
    AlreadyExists { order_id: OrderId },

    /// The audit record does not describe the update it was committed with.
    #[error("audit record rejected for {order_id}: {reason}")]
    InvalidRecord { order_id: OrderId, reason: String },

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
