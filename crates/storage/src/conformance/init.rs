use std::future::Future;

use orderflow_core::{OrderId, Stage};

use super::fixtures::{new_order, new_order_at};
use super::TestResult;
use crate::{OrderStore, RecordKind, StorageError};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "init",
        "insert_creates_order_at_version_0",
        insert_creates_order_at_version_0(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "insert_assigns_sequence_1_to_creation_record",
        insert_assigns_sequence_1_to_creation_record(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "inserted_order_readable_via_get_order",
        inserted_order_readable_via_get_order(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "double_insert_returns_already_exists",
        double_insert_returns_already_exists(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "double_insert_keeps_original_history",
        double_insert_keeps_original_history(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "creation_record_with_from_stage_rejected",
        creation_record_with_from_stage_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "creation_record_for_other_order_rejected",
        creation_record_for_other_order_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "different_orders_are_independent",
        different_orders_are_independent(factory).await,
    ));

    results
}

// ── 1. insert_order stores the order at version 0 ────────────────────────────

async fn insert_creates_order_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (mut order, creation) = new_order(1);
    order.version = 42;
    let (stored, _) = s
        .insert_order(order, creation)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    if stored.version != 0 {
        return Err(format!("expected version 0, got {}", stored.version));
    }
    if stored.stage != Stage::Placed {
        return Err(format!("expected PLACED, got {}", stored.stage));
    }
    if stored.assigned_agent.is_some() {
        return Err("new order must not be assigned".to_string());
    }
    Ok(())
}

// ── 2. creation record is numbered 1 ─────────────────────────────────────────

async fn insert_assigns_sequence_1_to_creation_record<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (order, mut creation) = new_order(1);
    creation.sequence = 99;
    let (_, record) = s
        .insert_order(order, creation)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    if record.sequence != 1 {
        return Err(format!("expected sequence 1, got {}", record.sequence));
    }
    let history = s
        .history(OrderId(1))
        .await
        .map_err(|e| format!("history: {e}"))?;
    if history.len() != 1 || history[0].kind != RecordKind::Created {
        return Err(format!("expected one creation record, got {:?}", history));
    }
    Ok(())
}

// ── 3. get_order reflects the insert ─────────────────────────────────────────

async fn inserted_order_readable_via_get_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (order, creation) = new_order_at(3, Stage::Confirmed);
    s.insert_order(order.clone(), creation)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let read = s
        .get_order(OrderId(3))
        .await
        .map_err(|e| format!("get: {e}"))?;
    if read.stage != Stage::Confirmed || read.customer_id != order.customer_id {
        return Err(format!("read back mismatch: {:?}", read));
    }
    Ok(())
}

// ── 4. inserting an existing id fails ────────────────────────────────────────

async fn double_insert_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (order, creation) = new_order(5);
    s.insert_order(order.clone(), creation.clone())
        .await
        .map_err(|e| format!("first insert: {e}"))?;
    match s.insert_order(order, creation).await {
        Err(StorageError::AlreadyExists { order_id }) if order_id == OrderId(5) => Ok(()),
        other => Err(format!("expected AlreadyExists for order 5, got {:?}", other)),
    }
}

// ── 5. a rejected duplicate leaves history untouched ─────────────────────────

async fn double_insert_keeps_original_history<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (order, creation) = new_order(5);
    s.insert_order(order, creation)
        .await
        .map_err(|e| format!("first insert: {e}"))?;
    let (dup, dup_creation) = new_order_at(5, Stage::Cancelled);
    let _ = s.insert_order(dup, dup_creation).await;

    let read = s
        .get_order(OrderId(5))
        .await
        .map_err(|e| format!("get: {e}"))?;
    if read.stage != Stage::Placed {
        return Err(format!("duplicate insert overwrote stage: {}", read.stage));
    }
    let history = s
        .history(OrderId(5))
        .await
        .map_err(|e| format!("history: {e}"))?;
    if history.len() != 1 {
        return Err(format!("expected 1 record, got {}", history.len()));
    }
    Ok(())
}

// ── 6. creation record must not carry a from_stage ───────────────────────────

async fn creation_record_with_from_stage_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (order, mut creation) = new_order(8);
    creation.from_stage = Some(Stage::Confirmed);
    match s.insert_order(order, creation).await {
        Err(StorageError::InvalidRecord { .. }) => {}
        other => return Err(format!("expected InvalidRecord, got {:?}", other)),
    }
    match s.get_order(OrderId(8)).await {
        Err(StorageError::OrderNotFound { .. }) => Ok(()),
        other => Err(format!("rejected insert left an order behind: {:?}", other)),
    }
}

// ── 7. creation record must target the inserted order ────────────────────────

async fn creation_record_for_other_order_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (order, _) = new_order(9);
    let (_, other_creation) = new_order(10);
    match s.insert_order(order, other_creation).await {
        Err(StorageError::InvalidRecord { order_id, .. }) if order_id == OrderId(9) => Ok(()),
        other => Err(format!("expected InvalidRecord for order 9, got {:?}", other)),
    }
}

// ── 8. orders do not share state ─────────────────────────────────────────────

async fn different_orders_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for (id, stage) in [(1, Stage::Placed), (2, Stage::Preparing)] {
        let (order, creation) = new_order_at(id, stage);
        s.insert_order(order, creation)
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    let a = s.get_order(OrderId(1)).await.map_err(|e| format!("get 1: {e}"))?;
    let b = s.get_order(OrderId(2)).await.map_err(|e| format!("get 2: {e}"))?;
    if a.stage != Stage::Placed || b.stage != Stage::Preparing {
        return Err(format!("stages crossed: {} / {}", a.stage, b.stage));
    }
    Ok(())
}
