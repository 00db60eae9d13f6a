use std::future::Future;

use orderflow_core::{ActorRole, OrderId, Stage};

use super::fixtures::{record_for, update};
use super::TestResult;
use crate::{OrderFilter, OrderStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_order_nonexistent",
        get_order_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_order_not_found_has_correct_id",
        get_order_not_found_has_correct_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "history_nonexistent",
        history_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "commit_transition_nonexistent",
        commit_transition_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_orders_empty",
        list_orders_empty(factory).await,
    ));

    results
}

// ── 1. get_order on empty store returns OrderNotFound ────────────────────────

async fn get_order_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_order(OrderId(999)).await {
        Err(StorageError::OrderNotFound { .. }) => Ok(()),
        other => Err(format!("expected OrderNotFound, got {:?}", other)),
    }
}

// ── 2. OrderNotFound carries the requested id ────────────────────────────────

async fn get_order_not_found_has_correct_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_order(OrderId(42)).await {
        Err(StorageError::OrderNotFound { order_id }) => {
            if order_id != OrderId(42) {
                return Err(format!("expected order 42, got {}", order_id));
            }
            Ok(())
        }
        other => Err(format!("expected OrderNotFound, got {:?}", other)),
    }
}

// ── 3. history of an unknown order is an error, not an empty log ─────────────

async fn history_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.history(OrderId(7)).await {
        Err(StorageError::OrderNotFound { order_id }) if order_id == OrderId(7) => Ok(()),
        other => Err(format!("expected OrderNotFound, got {:?}", other)),
    }
}

// ── 4. commit against an unknown order ───────────────────────────────────────

async fn commit_transition_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let upd = update(11, Stage::Placed, 0, Stage::Confirmed);
    let rec = record_for(&upd, ActorRole::Restaurant, 1);
    match s.commit_transition(upd, rec).await {
        Err(StorageError::OrderNotFound { order_id }) if order_id == OrderId(11) => Ok(()),
        other => Err(format!("expected OrderNotFound, got {:?}", other)),
    }
}

// ── 5. listing an empty store ────────────────────────────────────────────────

async fn list_orders_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let orders = s
        .list_orders(&OrderFilter::default())
        .await
        .map_err(|e| format!("list: {e}"))?;
    if !orders.is_empty() {
        return Err(format!("expected no orders, got {}", orders.len()));
    }
    Ok(())
}
