//! End-to-end lifecycle tests for the workflow engine over the in-memory
//! store: the documented scenarios, role gating, terminal closure and audit
//! completeness.

use orderflow_core::{ActorId, ActorRole, OrderId, Stage, TransitionTable};
use orderflow_engine::{
    verify_history, ConflictReason, NewOrder, OverrideRequest, TransitionRequest, WorkflowEngine,
    WorkflowError,
};
use orderflow_storage::{MemoryStore, RecordKind};

const RESTAURANT: ActorId = ActorId(10);
const CUSTOMER: ActorId = ActorId(20);
const DRIVER_A: ActorId = ActorId(30);
const DRIVER_B: ActorId = ActorId(31);
const ADMIN: ActorId = ActorId(1);

async fn engine_with(ids: &[u64]) -> WorkflowEngine<MemoryStore> {
    let engine = WorkflowEngine::new(MemoryStore::new());
    for id in ids {
        engine
            .place_order(NewOrder::new(OrderId(*id)).customer(CUSTOMER).restaurant(RESTAURANT.0))
            .await
            .unwrap();
    }
    engine
}

async fn step(
    engine: &WorkflowEngine<MemoryStore>,
    id: u64,
    role: ActorRole,
    actor: ActorId,
    to: Stage,
) -> Result<orderflow_engine::TransitionOutcome, WorkflowError> {
    engine
        .request_transition(TransitionRequest::new(OrderId(id), role, actor, to))
        .await
}

/// Drive an order from PLACED to READY_FOR_PICKUP as its restaurant.
async fn make_ready(engine: &WorkflowEngine<MemoryStore>, id: u64) {
    for to in [Stage::Confirmed, Stage::Preparing, Stage::ReadyForPickup] {
        step(engine, id, ActorRole::Restaurant, RESTAURANT, to)
            .await
            .unwrap();
    }
}

async fn assert_history_valid(engine: &WorkflowEngine<MemoryStore>, id: u64) {
    let order = engine.get_order(OrderId(id)).await.unwrap();
    let records = engine.history(OrderId(id)).await.unwrap();
    if let Err(violation) = verify_history(engine.table(), &order, &records) {
        panic!("history of order {id} failed verification: {violation}");
    }
}

// ──────────────────────────────────────────────
// Scenarios
// ──────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_confirm_cancel_then_no_pickup() {
    let engine = engine_with(&[1]).await;

    step(&engine, 1, ActorRole::Restaurant, RESTAURANT, Stage::Confirmed)
        .await
        .unwrap();
    step(&engine, 1, ActorRole::Customer, CUSTOMER, Stage::Cancelled)
        .await
        .unwrap();

    let err = step(&engine, 1, ActorRole::Driver, DRIVER_A, Stage::PickedUp)
        .await
        .unwrap_err();
    match &err {
        WorkflowError::InvalidTransition {
            current,
            attempted,
            legal_next,
            ..
        } => {
            assert_eq!(*current, Stage::Cancelled);
            assert_eq!(*attempted, Stage::PickedUp);
            assert!(legal_next.is_empty());
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
    assert!(err.to_string().contains("none (terminal stage)"));

    let history = engine.history(OrderId(1)).await.unwrap();
    let stages: Vec<Stage> = history.iter().map(|r| r.to_stage).collect();
    assert_eq!(stages, vec![Stage::Placed, Stage::Confirmed, Stage::Cancelled]);
    assert_history_valid(&engine, 1).await;
}

#[tokio::test]
async fn scenario_b_second_claim_conflicts() {
    let engine = engine_with(&[2]).await;
    make_ready(&engine, 2).await;

    let won = step(&engine, 2, ActorRole::Driver, DRIVER_A, Stage::PickedUp)
        .await
        .unwrap();
    assert_eq!(won.assigned_agent, Some(DRIVER_A));

    let lost = step(&engine, 2, ActorRole::Driver, DRIVER_B, Stage::PickedUp)
        .await
        .unwrap_err();
    assert!(matches!(
        lost,
        WorkflowError::Conflict {
            reason: ConflictReason::AlreadyClaimed { by },
            ..
        } if by == DRIVER_A
    ));
    assert!(lost.is_retryable());

    let order = engine.get_order(OrderId(2)).await.unwrap();
    assert_eq!(order.assigned_agent, Some(DRIVER_A));
    assert_eq!(order.stage, Stage::PickedUp);
}

#[tokio::test]
async fn late_claim_after_delivery_is_invalid() {
    let engine = engine_with(&[3]).await;
    make_ready(&engine, 3).await;
    step(&engine, 3, ActorRole::Driver, DRIVER_A, Stage::PickedUp)
        .await
        .unwrap();
    step(&engine, 3, ActorRole::Driver, DRIVER_A, Stage::Delivered)
        .await
        .unwrap();

    let err = step(&engine, 3, ActorRole::Driver, DRIVER_B, Stage::PickedUp)
        .await
        .unwrap_err();
    assert!(
        matches!(
            &err,
            WorkflowError::InvalidTransition { current: Stage::Delivered, legal_next, .. }
                if legal_next.is_empty()
        ),
        "{err:?}"
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn full_delivery_path() {
    let engine = engine_with(&[4]).await;
    make_ready(&engine, 4).await;
    step(&engine, 4, ActorRole::Driver, DRIVER_A, Stage::PickedUp)
        .await
        .unwrap();
    let done = step(&engine, 4, ActorRole::Driver, DRIVER_A, Stage::Delivered)
        .await
        .unwrap();
    assert_eq!(done.new_stage, Stage::Delivered);
    assert_eq!(done.sequence, 6);
    assert!(engine.legal_next_stages(Stage::Delivered).is_empty());
    assert_history_valid(&engine, 4).await;
}

// ──────────────────────────────────────────────
// Role gating
// ──────────────────────────────────────────────

#[tokio::test]
async fn role_gating_matches_the_table() {
    let table = TransitionTable::standard();
    let path = [
        Stage::Placed,
        Stage::Confirmed,
        Stage::Preparing,
        Stage::ReadyForPickup,
    ];

    for (idx, from) in path.iter().enumerate() {
        for to in Stage::ALL {
            for role in ActorRole::ALL {
                // Fresh order brought to `from` for every attempt.
                let engine = engine_with(&[1]).await;
                for next in &path[1..=idx] {
                    step(&engine, 1, ActorRole::Restaurant, RESTAURANT, *next)
                        .await
                        .unwrap();
                }
                let result = step(&engine, 1, role, ActorId(77), to).await;
                let allowed = table.is_allowed(*from, to, role);
                match result {
                    Ok(outcome) => {
                        assert!(allowed, "{from} -> {to} as {role} should be denied");
                        assert_eq!(outcome.new_stage, to);
                    }
                    Err(WorkflowError::InvalidTransition { .. }) => {
                        assert!(!allowed, "{from} -> {to} as {role} should be allowed");
                    }
                    Err(other) => panic!("{from} -> {to} as {role}: unexpected {other:?}"),
                }
            }
        }
    }
}

#[tokio::test]
async fn admin_has_no_workflow_transitions() {
    let engine = engine_with(&[1]).await;
    let err = step(&engine, 1, ActorRole::Admin, ADMIN, Stage::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
}

#[tokio::test]
async fn only_assignee_delivers() {
    let engine = engine_with(&[1]).await;
    make_ready(&engine, 1).await;
    step(&engine, 1, ActorRole::Driver, DRIVER_A, Stage::PickedUp)
        .await
        .unwrap();

    let err = step(&engine, 1, ActorRole::Driver, DRIVER_B, Stage::Delivered)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden { actor_id, .. } if actor_id == DRIVER_B));
    assert_eq!(engine.history(OrderId(1)).await.unwrap().len(), 5);
}

// ──────────────────────────────────────────────
// Terminal closure
// ──────────────────────────────────────────────

#[tokio::test]
async fn terminal_stages_reject_every_request() {
    let engine = engine_with(&[1, 2, 3]).await;
    step(&engine, 1, ActorRole::Customer, CUSTOMER, Stage::Cancelled)
        .await
        .unwrap();
    make_ready(&engine, 2).await;
    step(&engine, 2, ActorRole::Driver, DRIVER_A, Stage::PickedUp)
        .await
        .unwrap();
    step(&engine, 2, ActorRole::Driver, DRIVER_A, Stage::Delivered)
        .await
        .unwrap();
    // Claimed, then cancelled by an administrator: terminal with an assignee.
    make_ready(&engine, 3).await;
    step(&engine, 3, ActorRole::Driver, DRIVER_A, Stage::PickedUp)
        .await
        .unwrap();
    engine
        .override_stage(OverrideRequest {
            order_id: OrderId(3),
            admin_id: ADMIN,
            target_stage: Stage::Cancelled,
            reason: "restaurant closed".into(),
        })
        .await
        .unwrap();

    for id in [1, 2, 3] {
        let before = engine.history(OrderId(id)).await.unwrap().len();
        for to in Stage::ALL {
            for role in ActorRole::ALL {
                for actor in [DRIVER_A, DRIVER_B] {
                    let result = step(&engine, id, role, actor, to).await;
                    assert!(
                        matches!(
                            &result,
                            Err(WorkflowError::InvalidTransition { legal_next, .. })
                                if legal_next.is_empty()
                        ),
                        "order {id}: {to} as {role} {actor} was not rejected: {result:?}"
                    );
                }
            }
        }
        let after = engine.history(OrderId(id)).await.unwrap().len();
        assert_eq!(before, after, "terminal order {id} gained records");
    }
}

#[tokio::test]
async fn override_reopens_terminal_order() {
    let engine = engine_with(&[1]).await;
    step(&engine, 1, ActorRole::Customer, CUSTOMER, Stage::Cancelled)
        .await
        .unwrap();

    let outcome = engine
        .override_stage(OverrideRequest {
            order_id: OrderId(1),
            admin_id: ADMIN,
            target_stage: Stage::Confirmed,
            reason: "customer called back".into(),
        })
        .await
        .unwrap();
    assert_eq!(outcome.previous_stage, Stage::Cancelled);

    // The workflow resumes from the overridden stage.
    step(&engine, 1, ActorRole::Restaurant, RESTAURANT, Stage::Preparing)
        .await
        .unwrap();
    assert_history_valid(&engine, 1).await;

    let history = engine.history(OrderId(1)).await.unwrap();
    let overrides: Vec<_> = history
        .iter()
        .filter(|r| r.kind == RecordKind::Override)
        .collect();
    assert_eq!(overrides.len(), 1);
    assert!(overrides[0]
        .note
        .as_deref()
        .is_some_and(|n| n.starts_with("[ADMIN OVERRIDE]")));
}

#[tokio::test]
async fn override_of_unknown_order_is_not_found() {
    let engine = engine_with(&[]).await;
    let err = engine
        .override_stage(OverrideRequest {
            order_id: OrderId(404),
            admin_id: ADMIN,
            target_stage: Stage::Delivered,
            reason: "cleanup".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound { .. }));
}

// ──────────────────────────────────────────────
// Audit completeness
// ──────────────────────────────────────────────

#[tokio::test]
async fn every_success_writes_exactly_one_record() {
    let engine = engine_with(&[1]).await;
    let attempts = [
        (ActorRole::Customer, CUSTOMER, Stage::Confirmed, false),
        (ActorRole::Restaurant, RESTAURANT, Stage::Confirmed, true),
        (ActorRole::Driver, DRIVER_A, Stage::PickedUp, false),
        (ActorRole::Restaurant, RESTAURANT, Stage::Preparing, true),
        (ActorRole::Restaurant, RESTAURANT, Stage::ReadyForPickup, true),
        (ActorRole::Driver, DRIVER_A, Stage::Delivered, false),
        (ActorRole::Driver, DRIVER_A, Stage::PickedUp, true),
        (ActorRole::Driver, DRIVER_B, Stage::Delivered, false),
        (ActorRole::Driver, DRIVER_A, Stage::Delivered, true),
    ];

    let mut expected_len = 1;
    for (role, actor, to, should_succeed) in attempts {
        let result = step(&engine, 1, role, actor, to).await;
        assert_eq!(result.is_ok(), should_succeed, "{role} -> {to}: {result:?}");
        if should_succeed {
            expected_len += 1;
        }
        let history = engine.history(OrderId(1)).await.unwrap();
        assert_eq!(history.len(), expected_len);
    }

    let order = engine.get_order(OrderId(1)).await.unwrap();
    assert_eq!(order.version as usize + 1, expected_len);
    assert_history_valid(&engine, 1).await;
}

#[tokio::test]
async fn records_carry_actor_and_note() {
    let engine = engine_with(&[1]).await;
    engine
        .request_transition(
            TransitionRequest::new(OrderId(1), ActorRole::Restaurant, RESTAURANT, Stage::Confirmed)
                .with_note("kitchen accepted"),
        )
        .await
        .unwrap();
    let history = engine.history(OrderId(1)).await.unwrap();
    let rec = &history[1];
    assert_eq!(rec.sequence, 2);
    assert_eq!(rec.from_stage, Some(Stage::Placed));
    assert_eq!(rec.actor_id, Some(RESTAURANT));
    assert_eq!(rec.actor_role, Some(ActorRole::Restaurant));
    assert_eq!(rec.kind, RecordKind::Workflow);
    assert_eq!(rec.note.as_deref(), Some("kitchen accepted"));
    assert!(rec.recorded_at.ends_with('Z'));
}
