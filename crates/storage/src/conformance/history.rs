use std::future::Future;

use orderflow_core::{ActorId, ActorRole, OrderId, Stage};

use super::fixtures::{claim, new_order, new_order_at, record_for, update};
use super::TestResult;
use crate::{OrderFilter, OrderStore, RecordKind};

pub(super) async fn run_history_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "history",
        "history_in_commit_order",
        history_in_commit_order(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "history_chain_is_continuous",
        history_chain_is_continuous(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "history_preserves_kind_and_note",
        history_preserves_kind_and_note(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "histories_are_per_order",
        histories_are_per_order(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "list_orders_ascending_by_id",
        list_orders_ascending_by_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "list_orders_by_stage",
        list_orders_by_stage(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "list_orders_unassigned_and_assigned",
        list_orders_unassigned_and_assigned(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "list_orders_by_customer_and_restaurant",
        list_orders_by_customer_and_restaurant(factory).await,
    ));

    results
}

fn ids(orders: &[crate::Order]) -> Vec<u64> {
    orders.iter().map(|o| o.id.0).collect()
}

// ── 1. records come back in the order they were committed ────────────────────

async fn history_in_commit_order<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let path = [
        Stage::Placed,
        Stage::Confirmed,
        Stage::Preparing,
        Stage::ReadyForPickup,
    ];
    for (version, pair) in path.windows(2).enumerate() {
        let upd = update(1, pair[0], version as i64, pair[1]);
        let rec = record_for(&upd, ActorRole::Restaurant, 10);
        s.commit_transition(upd, rec)
            .await
            .map_err(|e| format!("commit {} -> {}: {e}", pair[0], pair[1]))?;
    }

    let history = s.history(OrderId(1)).await.map_err(|e| format!("history: {e}"))?;
    let stages: Vec<Stage> = history.iter().map(|r| r.to_stage).collect();
    if stages != path {
        return Err(format!("expected {:?}, got {:?}", path, stages));
    }
    Ok(())
}

// ── 2. each record starts where the previous ended ───────────────────────────

async fn history_chain_is_continuous<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (order, creation) = new_order_at(1, Stage::ReadyForPickup);
    s.insert_order(order, creation)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let upd = claim(1, 0, 500);
    let rec = record_for(&upd, ActorRole::Driver, 500);
    s.commit_transition(upd, rec)
        .await
        .map_err(|e| format!("claim: {e}"))?;
    let upd = update(1, Stage::PickedUp, 1, Stage::Delivered);
    let rec = record_for(&upd, ActorRole::Driver, 500);
    s.commit_transition(upd, rec)
        .await
        .map_err(|e| format!("deliver: {e}"))?;

    let history = s.history(OrderId(1)).await.map_err(|e| format!("history: {e}"))?;
    if history.first().and_then(|r| r.from_stage).is_some() {
        return Err("first record must have no from_stage".to_string());
    }
    for pair in history.windows(2) {
        if pair[1].from_stage != Some(pair[0].to_stage) {
            return Err(format!(
                "chain broken between sequence {} and {}",
                pair[0].sequence, pair[1].sequence
            ));
        }
    }
    let order = s.get_order(OrderId(1)).await.map_err(|e| format!("get: {e}"))?;
    if history.len() as i64 != order.version + 1 {
        return Err(format!(
            "history length {} does not match version {}",
            history.len(),
            order.version
        ));
    }
    Ok(())
}

// ── 3. override metadata survives storage ────────────────────────────────────

async fn history_preserves_kind_and_note<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (order, creation) = new_order_at(1, Stage::Delivered);
    s.insert_order(order, creation)
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let upd = update(1, Stage::Delivered, 0, Stage::PickedUp);
    let mut rec = record_for(&upd, ActorRole::Admin, 1);
    rec.kind = RecordKind::Override;
    rec.note = Some("[ADMIN OVERRIDE] customer dispute".to_string());
    s.commit_transition(upd, rec.clone())
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let history = s.history(OrderId(1)).await.map_err(|e| format!("history: {e}"))?;
    let last = history.last().ok_or("empty history")?;
    if last.kind != RecordKind::Override || last.note != rec.note {
        return Err(format!("override record altered: {:?}", last));
    }
    if last.actor_id != Some(ActorId(1)) || last.actor_role != Some(ActorRole::Admin) {
        return Err(format!("actor altered: {:?}", last));
    }
    Ok(())
}

// ── 4. commits on one order do not leak into another ─────────────────────────

async fn histories_are_per_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for id in [1, 2] {
        let (order, creation) = new_order(id);
        s.insert_order(order, creation)
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    let upd = update(1, Stage::Placed, 0, Stage::Confirmed);
    let rec = record_for(&upd, ActorRole::Restaurant, 10);
    s.commit_transition(upd, rec)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let h2 = s.history(OrderId(2)).await.map_err(|e| format!("history: {e}"))?;
    if h2.len() != 1 || h2.iter().any(|r| r.order_id != OrderId(2)) {
        return Err(format!("order 2 history polluted: {:?}", h2));
    }
    Ok(())
}

// ── 5. listing order ─────────────────────────────────────────────────────────

async fn list_orders_ascending_by_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for id in [30, 4, 17] {
        let (order, creation) = new_order(id);
        s.insert_order(order, creation)
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    let orders = s
        .list_orders(&OrderFilter::default())
        .await
        .map_err(|e| format!("list: {e}"))?;
    if ids(&orders) != vec![4, 17, 30] {
        return Err(format!("expected [4, 17, 30], got {:?}", ids(&orders)));
    }
    Ok(())
}

// ── 6. stage filter ──────────────────────────────────────────────────────────

async fn list_orders_by_stage<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for (id, stage) in [
        (1, Stage::Placed),
        (2, Stage::Preparing),
        (3, Stage::Placed),
        (4, Stage::Cancelled),
    ] {
        let (order, creation) = new_order_at(id, stage);
        s.insert_order(order, creation)
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    let placed = s
        .list_orders(&OrderFilter::at_stage(Stage::Placed))
        .await
        .map_err(|e| format!("list: {e}"))?;
    if ids(&placed) != vec![1, 3] {
        return Err(format!("expected [1, 3], got {:?}", ids(&placed)));
    }
    let delivered = s
        .list_orders(&OrderFilter::at_stage(Stage::Delivered))
        .await
        .map_err(|e| format!("list: {e}"))?;
    if !delivered.is_empty() {
        return Err(format!("expected none delivered, got {:?}", ids(&delivered)));
    }
    Ok(())
}

// ── 7. assignment filters ────────────────────────────────────────────────────

async fn list_orders_unassigned_and_assigned<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for id in [1, 2, 3] {
        let (order, creation) = new_order_at(id, Stage::ReadyForPickup);
        s.insert_order(order, creation)
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    let upd = claim(2, 0, 500);
    let rec = record_for(&upd, ActorRole::Driver, 500);
    s.commit_transition(upd, rec)
        .await
        .map_err(|e| format!("claim: {e}"))?;

    let open = s
        .list_orders(&OrderFilter {
            stage: Some(Stage::ReadyForPickup),
            unassigned: true,
            ..Default::default()
        })
        .await
        .map_err(|e| format!("list: {e}"))?;
    if ids(&open) != vec![1, 3] {
        return Err(format!("expected [1, 3] open, got {:?}", ids(&open)));
    }
    let mine = s
        .list_orders(&OrderFilter {
            assigned_agent: Some(ActorId(500)),
            ..Default::default()
        })
        .await
        .map_err(|e| format!("list: {e}"))?;
    if ids(&mine) != vec![2] {
        return Err(format!("expected [2] for agent, got {:?}", ids(&mine)));
    }
    Ok(())
}

// ── 8. customer and restaurant filters ───────────────────────────────────────

async fn list_orders_by_customer_and_restaurant<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OrderStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for id in [1, 2, 3] {
        let (mut order, creation) = new_order(id);
        if id == 3 {
            order.restaurant_id = Some(9);
        }
        s.insert_order(order, creation)
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }
    let by_customer = s
        .list_orders(&OrderFilter {
            customer_id: Some(ActorId(102)),
            ..Default::default()
        })
        .await
        .map_err(|e| format!("list: {e}"))?;
    if ids(&by_customer) != vec![2] {
        return Err(format!("expected [2] for customer, got {:?}", ids(&by_customer)));
    }
    let by_restaurant = s
        .list_orders(&OrderFilter {
            restaurant_id: Some(9),
            ..Default::default()
        })
        .await
        .map_err(|e| format!("list: {e}"))?;
    if ids(&by_restaurant) != vec![3] {
        return Err(format!("expected [3] for restaurant, got {:?}", ids(&by_restaurant)));
    }
    Ok(())
}
