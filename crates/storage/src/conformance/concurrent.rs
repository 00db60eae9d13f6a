use std::future::Future;
use std::sync::Arc;

use orderflow_core::{ActorId, ActorRole, OrderId, Stage};

use super::fixtures::{claim, new_order, new_order_at, record_for, update};
use super::TestResult;
use crate::{OrderStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_claims_exactly_one_wins",
        concurrent_claims_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_inserts_exactly_one_wins",
        concurrent_inserts_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_commits_different_orders_all_succeed",
        concurrent_commits_different_orders_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_commits_final_state_consistent",
        concurrent_commits_final_state_consistent(factory).await,
    ));

    results
}

// ── Concurrent claim: exactly one wins ───────────────────────────────────────

/// N drivers race to claim the same order from version 0. Exactly one commit
/// succeeds; the rest must get ConcurrentConflict, and the log holds a single
/// PICKED_UP record naming the winner.
async fn concurrent_claims_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let (order, creation) = new_order_at(1, Stage::ReadyForPickup);
    storage
        .insert_order(order, creation)
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        let agent = 500 + i as u64;
        handles.push(tokio::spawn(async move {
            let upd = claim(1, 0, agent);
            let rec = record_for(&upd, ActorRole::Driver, agent);
            match s.commit_transition(upd, rec).await {
                Ok(_) => Ok(Some(agent)),
                Err(StorageError::ConcurrentConflict { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = Vec::new();
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        match won {
            Some(agent) => winners.push(agent),
            None => losers += 1,
        }
    }

    if winners.len() != 1 {
        return Err(format!("expected exactly 1 winner, got {:?}", winners));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    let order = storage
        .get_order(OrderId(1))
        .await
        .map_err(|e| format!("get: {e}"))?;
    if order.assigned_agent != Some(ActorId(winners[0])) {
        return Err(format!(
            "assigned agent {:?} is not the winner {}",
            order.assigned_agent, winners[0]
        ));
    }
    let history = storage
        .history(OrderId(1))
        .await
        .map_err(|e| format!("history: {e}"))?;
    let pickups = history
        .iter()
        .filter(|r| r.to_stage == Stage::PickedUp)
        .count();
    if pickups != 1 {
        return Err(format!("expected 1 PICKED_UP record, got {pickups}"));
    }
    Ok(())
}

// ── Concurrent insert: exactly one wins ──────────────────────────────────────

/// N tasks each attempt to insert the same order id. Exactly one succeeds;
/// the rest must get AlreadyExists.
async fn concurrent_inserts_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let (order, creation) = new_order(1);
            match s.insert_order(order, creation).await {
                Ok(_) => Ok(true),
                Err(StorageError::AlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    let history = storage
        .history(OrderId(1))
        .await
        .map_err(|e| format!("history: {e}"))?;
    if history.len() != 1 {
        return Err(format!("expected 1 creation record, got {}", history.len()));
    }
    Ok(())
}

// ── Different orders do not contend ──────────────────────────────────────────

/// N tasks each confirm their own order. All must succeed.
async fn concurrent_commits_different_orders_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    for i in 0..N {
        let (order, creation) = new_order(i as u64);
        storage
            .insert_order(order, creation)
            .await
            .map_err(|e| format!("insert {i}: {e}"))?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let upd = update(i as u64, Stage::Placed, 0, Stage::Confirmed);
            let rec = record_for(&upd, ActorRole::Restaurant, 10);
            s.commit_transition(upd, rec).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("order {i} failed: {e}"))?;
    }

    for i in 0..N {
        let order = storage
            .get_order(OrderId(i as u64))
            .await
            .map_err(|e| format!("get {i}: {e}"))?;
        if order.stage != Stage::Confirmed || order.version != 1 {
            return Err(format!("order {i} at {} v{}", order.stage, order.version));
        }
    }
    Ok(())
}

// ── Final state consistent with history ──────────────────────────────────────

/// N tasks race to move one order out of PLACED, half confirming and half
/// cancelling. Whatever wins, the order's stage and version must agree with
/// its log.
async fn concurrent_commits_final_state_consistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let (order, creation) = new_order(1);
    storage
        .insert_order(order, creation)
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let (to, role) = if i % 2 == 0 {
                (Stage::Confirmed, ActorRole::Restaurant)
            } else {
                (Stage::Cancelled, ActorRole::Customer)
            };
            let upd = update(1, Stage::Placed, 0, to);
            let rec = record_for(&upd, role, i as u64);
            s.commit_transition(upd, rec).await
        }));
    }
    for handle in handles {
        match handle.await.map_err(|e| format!("task panic: {e}"))? {
            Ok(_) | Err(StorageError::ConcurrentConflict { .. }) => {}
            Err(e) => return Err(format!("storage error: {e}")),
        }
    }

    let order = storage
        .get_order(OrderId(1))
        .await
        .map_err(|e| format!("get: {e}"))?;
    let history = storage
        .history(OrderId(1))
        .await
        .map_err(|e| format!("history: {e}"))?;
    if order.version != 1 || history.len() != 2 {
        return Err(format!(
            "expected version 1 with 2 records, got v{} with {}",
            order.version,
            history.len()
        ));
    }
    let last = history.last().ok_or("empty history")?;
    if last.to_stage != order.stage {
        return Err(format!(
            "order at {} but last record enters {}",
            order.stage, last.to_stage
        ));
    }
    Ok(())
}
