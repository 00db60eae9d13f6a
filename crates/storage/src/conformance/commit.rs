use std::future::Future;

use orderflow_core::{ActorId, ActorRole, OrderId, Stage};

use super::fixtures::{claim, new_order, new_order_at, record_for, update};
use super::TestResult;
use crate::{OrderStore, RecordKind, StageUpdate, StorageError};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    // Successful commits
    results.push(TestResult::from_result(
        "commit",
        "commit_advances_stage_and_version",
        commit_advances_stage_and_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "commit_appends_record_with_next_sequence",
        commit_appends_record_with_next_sequence(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "commit_sets_updated_at_from_record",
        commit_sets_updated_at_from_record(factory).await,
    ));

    // Compare-and-set guard
    results.push(TestResult::from_result(
        "commit",
        "stale_stage_returns_conflict",
        stale_stage_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "stale_version_returns_conflict",
        stale_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "conflict_writes_nothing",
        conflict_writes_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "conflict_reports_found_state",
        conflict_reports_found_state(factory).await,
    ));

    // Assignment
    results.push(TestResult::from_result(
        "commit",
        "claim_assigns_agent",
        claim_assigns_agent(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "assign_on_assigned_order_conflicts",
        assign_on_assigned_order_conflicts(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "plain_update_keeps_assignment",
        plain_update_keeps_assignment(factory).await,
    ));

    // Record validation
    results.push(TestResult::from_result(
        "commit",
        "record_not_matching_update_rejected",
        record_not_matching_update_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "creation_record_rejected_as_transition",
        creation_record_rejected_as_transition(factory).await,
    ));

    results
}

async fn commit<S: OrderStore>(s: &S, upd: StageUpdate, role: ActorRole, actor: u64) -> Result<(), String> {
    let rec = record_for(&upd, role, actor);
    s.commit_transition(upd, rec)
        .await
        .map(|_| ())
        .map_err(|e| format!("commit: {e}"))
}

async fn insert<S: OrderStore>(s: &S, id: u64, stage: Stage) -> Result<(), String> {
    let (order, creation) = new_order_at(id, stage);
    s.insert_order(order, creation)
        .await
        .map(|_| ())
        .map_err(|e| format!("insert {id}: {e}"))
}

// ── 1. stage and version move together ───────────────────────────────────────

async fn commit_advances_stage_and_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (order, creation) = new_order(1);
    s.insert_order(order, creation)
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let upd = update(1, Stage::Placed, 0, Stage::Confirmed);
    let rec = record_for(&upd, ActorRole::Restaurant, 10);
    let (order, _) = s
        .commit_transition(upd, rec)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    if order.stage != Stage::Confirmed || order.version != 1 {
        return Err(format!(
            "expected CONFIRMED at version 1, got {} at {}",
            order.stage, order.version
        ));
    }
    let read = s.get_order(OrderId(1)).await.map_err(|e| format!("get: {e}"))?;
    if read != order {
        return Err(format!("returned order {:?} differs from stored {:?}", order, read));
    }
    Ok(())
}

// ── 2. audit record numbering ────────────────────────────────────────────────

async fn commit_appends_record_with_next_sequence<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    insert(&s, 1, Stage::Placed).await?;
    commit(&s, update(1, Stage::Placed, 0, Stage::Confirmed), ActorRole::Restaurant, 10).await?;

    let upd = update(1, Stage::Confirmed, 1, Stage::Preparing);
    let mut rec = record_for(&upd, ActorRole::Restaurant, 10);
    rec.sequence = 77;
    let (_, stored) = s
        .commit_transition(upd, rec)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    if stored.sequence != 3 {
        return Err(format!("expected sequence 3, got {}", stored.sequence));
    }
    let history = s.history(OrderId(1)).await.map_err(|e| format!("history: {e}"))?;
    let sequences: Vec<u64> = history.iter().map(|r| r.sequence).collect();
    if sequences != vec![1, 2, 3] {
        return Err(format!("expected sequences [1, 2, 3], got {:?}", sequences));
    }
    if history[2] != stored {
        return Err("returned record differs from stored record".to_string());
    }
    Ok(())
}

// ── 3. updated_at follows the committed record ───────────────────────────────

async fn commit_sets_updated_at_from_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    insert(&s, 1, Stage::Placed).await?;
    let upd = update(1, Stage::Placed, 0, Stage::Cancelled);
    let mut rec = record_for(&upd, ActorRole::Customer, 101);
    rec.recorded_at = "2025-06-01T12:30:00Z".to_string();
    let (order, _) = s
        .commit_transition(upd, rec)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    if order.updated_at != "2025-06-01T12:30:00Z" {
        return Err(format!("unexpected updated_at {}", order.updated_at));
    }
    Ok(())
}

// ── 4. expected stage no longer current ──────────────────────────────────────

async fn stale_stage_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    insert(&s, 1, Stage::Confirmed).await?;
    let upd = update(1, Stage::Placed, 0, Stage::Cancelled);
    let rec = record_for(&upd, ActorRole::Customer, 101);
    match s.commit_transition(upd, rec).await {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }
}

// ── 5. expected version no longer current ────────────────────────────────────

async fn stale_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    insert(&s, 1, Stage::Placed).await?;
    commit(&s, update(1, Stage::Placed, 0, Stage::Confirmed), ActorRole::Restaurant, 10).await?;
    // Right stage, stale version.
    let upd = update(1, Stage::Confirmed, 0, Stage::Preparing);
    let rec = record_for(&upd, ActorRole::Restaurant, 10);
    match s.commit_transition(upd, rec).await {
        Err(StorageError::ConcurrentConflict {
            expected_version: 0,
            found_version: 1,
            ..
        }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict at version 1, got {:?}", other)),
    }
}

// ── 6. a rejected commit leaves no trace ─────────────────────────────────────

async fn conflict_writes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    insert(&s, 1, Stage::Preparing).await?;
    let before = s.get_order(OrderId(1)).await.map_err(|e| format!("get: {e}"))?;

    let upd = update(1, Stage::Confirmed, 0, Stage::Cancelled);
    let rec = record_for(&upd, ActorRole::Customer, 101);
    let _ = s.commit_transition(upd, rec).await;

    let after = s.get_order(OrderId(1)).await.map_err(|e| format!("get: {e}"))?;
    if before != after {
        return Err(format!("order changed by rejected commit: {:?} -> {:?}", before, after));
    }
    let history = s.history(OrderId(1)).await.map_err(|e| format!("history: {e}"))?;
    if history.len() != 1 {
        return Err(format!("expected 1 record after conflict, got {}", history.len()));
    }
    Ok(())
}

// ── 7. conflict diagnostics ──────────────────────────────────────────────────

async fn conflict_reports_found_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    insert(&s, 4, Stage::Cancelled).await?;
    let upd = update(4, Stage::Placed, 0, Stage::Confirmed);
    let rec = record_for(&upd, ActorRole::Restaurant, 10);
    match s.commit_transition(upd, rec).await {
        Err(StorageError::ConcurrentConflict {
            order_id,
            expected_stage,
            found_stage,
            already_assigned,
            ..
        }) => {
            if order_id != OrderId(4)
                || expected_stage != Stage::Placed
                || found_stage != Stage::Cancelled
                || already_assigned
            {
                return Err(format!(
                    "wrong conflict fields: {} {} {} {}",
                    order_id, expected_stage, found_stage, already_assigned
                ));
            }
            Ok(())
        }
        other => Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }
}

// ── 8. assign_if_unset assigns ───────────────────────────────────────────────

async fn claim_assigns_agent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    insert(&s, 1, Stage::ReadyForPickup).await?;
    commit(&s, claim(1, 0, 500), ActorRole::Driver, 500).await?;
    let order = s.get_order(OrderId(1)).await.map_err(|e| format!("get: {e}"))?;
    if order.assigned_agent != Some(ActorId(500)) || order.stage != Stage::PickedUp {
        return Err(format!("claim not applied: {:?}", order));
    }
    Ok(())
}

// ── 9. assign_if_unset refuses to overwrite an assignment ────────────────────

async fn assign_on_assigned_order_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    insert(&s, 1, Stage::ReadyForPickup).await?;
    commit(&s, claim(1, 0, 500), ActorRole::Driver, 500).await?;

    // Stage and version match; only the assignment guard can reject this.
    let upd = StageUpdate {
        assign_if_unset: Some(ActorId(501)),
        ..update(1, Stage::PickedUp, 1, Stage::Delivered)
    };
    let rec = record_for(&upd, ActorRole::Driver, 501);
    match s.commit_transition(upd, rec).await {
        Err(StorageError::ConcurrentConflict {
            already_assigned: true,
            ..
        }) => {}
        other => return Err(format!("expected assignment conflict, got {:?}", other)),
    }
    let order = s.get_order(OrderId(1)).await.map_err(|e| format!("get: {e}"))?;
    if order.assigned_agent != Some(ActorId(500)) {
        return Err(format!("assignment overwritten: {:?}", order.assigned_agent));
    }
    Ok(())
}

// ── 10. updates without assignment leave the agent alone ─────────────────────

async fn plain_update_keeps_assignment<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    insert(&s, 1, Stage::ReadyForPickup).await?;
    commit(&s, claim(1, 0, 500), ActorRole::Driver, 500).await?;
    commit(&s, update(1, Stage::PickedUp, 1, Stage::Delivered), ActorRole::Driver, 500).await?;
    let order = s.get_order(OrderId(1)).await.map_err(|e| format!("get: {e}"))?;
    if order.assigned_agent != Some(ActorId(500)) || order.stage != Stage::Delivered {
        return Err(format!("unexpected order after delivery: {:?}", order));
    }
    Ok(())
}

// ── 11. record must describe the update ──────────────────────────────────────

async fn record_not_matching_update_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    insert(&s, 1, Stage::Placed).await?;
    let upd = update(1, Stage::Placed, 0, Stage::Confirmed);
    let mut rec = record_for(&upd, ActorRole::Restaurant, 10);
    rec.to_stage = Stage::Cancelled;
    match s.commit_transition(upd, rec).await {
        Err(StorageError::InvalidRecord { .. }) => {}
        other => return Err(format!("expected InvalidRecord, got {:?}", other)),
    }
    let order = s.get_order(OrderId(1)).await.map_err(|e| format!("get: {e}"))?;
    if order.stage != Stage::Placed || order.version != 0 {
        return Err(format!("rejected record still changed the order: {:?}", order));
    }
    Ok(())
}

// ── 12. the creation kind is reserved for insert_order ───────────────────────

async fn creation_record_rejected_as_transition<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    insert(&s, 1, Stage::Placed).await?;
    let upd = update(1, Stage::Placed, 0, Stage::Confirmed);
    let mut rec = record_for(&upd, ActorRole::Restaurant, 10);
    rec.kind = RecordKind::Created;
    match s.commit_transition(upd, rec).await {
        Err(StorageError::InvalidRecord { .. }) => Ok(()),
        other => Err(format!("expected InvalidRecord, got {:?}", other)),
    }
}
