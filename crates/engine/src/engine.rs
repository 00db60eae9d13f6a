//! The workflow engine.
//!
//! Every stage change of an order goes through [`WorkflowEngine`]. A request
//! is handled in one pass:
//!
//! 1. Read the order (stage, version, assignment)
//! 2. Reject a claim on a live order another agent already holds
//! 3. Validate `(stage, desired, role)` against the transition table
//! 4. Enforce the assignee-only rule
//! 5. Commit the conditional update and its audit record as one store call
//!
//! The engine holds no lock of its own. Concurrent requests on one order are
//! serialized by the store's compare-and-set; the loser sees `Conflict` and
//! nothing is written on its behalf. The engine never retries.

use std::collections::BTreeSet;
use std::sync::Arc;

use orderflow_core::{validate, ActorRole, AssignmentRule, OrderId, Stage, TransitionTable};
use orderflow_storage::{
    Order, OrderStore, RecordKind, StageChangeRecord, StageUpdate, StorageError,
};
use tracing::{debug, info, warn};

use crate::error::{ConflictReason, WorkflowError};
use crate::request::{NewOrder, OverrideRequest, TransitionOutcome, TransitionRequest};

/// Note prefix marking administrative overrides in the audit log.
pub const DEFAULT_OVERRIDE_PREFIX: &str = "[ADMIN OVERRIDE]";

/// Tunables that do not affect legality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub override_note_prefix: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            override_note_prefix: DEFAULT_OVERRIDE_PREFIX.to_string(),
        }
    }
}

/// Orchestrates order stage changes over an injected [`OrderStore`].
pub struct WorkflowEngine<S> {
    table: Arc<TransitionTable>,
    store: S,
    options: EngineOptions,
}

impl<S: OrderStore> WorkflowEngine<S> {
    /// An engine over the standard transition table.
    pub fn new(store: S) -> Self {
        Self::with_table(Arc::new(TransitionTable::standard()), store)
    }

    pub fn with_table(table: Arc<TransitionTable>, store: S) -> Self {
        WorkflowEngine {
            table,
            store,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Stages reachable from `stage` in one step, by any role.
    pub fn legal_next_stages(&self, stage: Stage) -> BTreeSet<Stage> {
        self.table.legal_next_stages(stage)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, WorkflowError> {
        Ok(self.store.get_order(order_id).await?)
    }

    /// Full audit history of an order, in commit order.
    pub async fn history(&self, order_id: OrderId) -> Result<Vec<StageChangeRecord>, WorkflowError> {
        Ok(self.store.history(order_id).await?)
    }

    /// Register a new order at the initial stage together with its creation
    /// record.
    pub async fn place_order(&self, new_order: NewOrder) -> Result<Order, WorkflowError> {
        let now = now_iso8601();
        let order = Order {
            id: new_order.order_id,
            stage: Stage::INITIAL,
            assigned_agent: None,
            customer_id: new_order.customer_id,
            restaurant_id: new_order.restaurant_id,
            version: 0,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        let creation = StageChangeRecord {
            sequence: 0,
            order_id: new_order.order_id,
            from_stage: None,
            to_stage: Stage::INITIAL,
            actor_id: new_order.customer_id,
            actor_role: new_order.customer_id.map(|_| ActorRole::Customer),
            kind: RecordKind::Created,
            note: new_order.note,
            recorded_at: now,
        };

        let (order, record) = self.store.insert_order(order, creation).await?;
        info!(
            order_id = order.id.0,
            to = %order.stage,
            sequence = record.sequence,
            "order placed"
        );
        Ok(order)
    }

    /// Apply one workflow transition on behalf of an actor.
    pub async fn request_transition(
        &self,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let TransitionRequest {
            order_id,
            actor_role,
            actor_id,
            desired_stage,
            note,
        } = request;

        // 1. Current state
        let order = self.store.get_order(order_id).await?;

        // 2. A claim on an order held by someone else is a lost race, not an
        //    illegal move, even if the holder has already moved it on. Terminal
        //    orders and non-claim routes into the same stage go to validation.
        let claim_route = matches!(
            self.table.rule_for(order.stage, desired_stage, actor_role),
            None | Some(AssignmentRule::Claim)
        );
        if claim_route
            && !self.table.is_terminal(order.stage)
            && self.table.is_claim_target(desired_stage, actor_role)
        {
            if let Some(by) = order.assigned_agent.filter(|agent| *agent != actor_id) {
                warn!(
                    order_id = order_id.0,
                    actor_id = actor_id.0,
                    claimed_by = by.0,
                    "claim rejected: order already claimed"
                );
                return Err(WorkflowError::Conflict {
                    order_id,
                    reason: ConflictReason::AlreadyClaimed { by },
                });
            }
        }

        // 3. Legality
        let rule = validate(&self.table, order.stage, desired_stage, actor_role).map_err(|denied| {
            debug!(
                order_id = order_id.0,
                from = %order.stage,
                to = %desired_stage,
                role = %actor_role,
                "transition denied"
            );
            WorkflowError::invalid_transition(order_id, denied)
        })?;

        // 4. Ownership
        if rule == AssignmentRule::AssigneeOnly && order.assigned_agent != Some(actor_id) {
            debug!(
                order_id = order_id.0,
                actor_id = actor_id.0,
                to = %desired_stage,
                "transition denied: actor is not the assignee"
            );
            return Err(WorkflowError::Forbidden {
                order_id,
                actor_id,
                assigned_agent: order.assigned_agent,
            });
        }

        // 5. Conditional commit. A re-claim by the current holder leaves the
        //    assignment as is; the version guard still covers the race.
        let assign_if_unset = (rule == AssignmentRule::Claim && order.assigned_agent.is_none())
            .then_some(actor_id);
        let update = StageUpdate {
            order_id,
            expected_stage: order.stage,
            expected_version: order.version,
            new_stage: desired_stage,
            assign_if_unset,
        };
        let record = StageChangeRecord {
            sequence: 0,
            order_id,
            from_stage: Some(order.stage),
            to_stage: desired_stage,
            actor_id: Some(actor_id),
            actor_role: Some(actor_role),
            kind: RecordKind::Workflow,
            note,
            recorded_at: now_iso8601(),
        };
        let (committed, record) = self.commit(update, record).await?;

        info!(
            order_id = order_id.0,
            from = %order.stage,
            to = %committed.stage,
            role = %actor_role,
            actor_id = actor_id.0,
            sequence = record.sequence,
            "transition committed"
        );
        Ok(TransitionOutcome::committed(&committed, &record))
    }

    /// Move an order to any stage on an administrator's authority.
    ///
    /// The transition table is not consulted, so this never fails with
    /// `InvalidTransition`. The move is still a conditional commit and can
    /// lose a race (`Conflict`). The assignment is never touched.
    pub async fn override_stage(
        &self,
        request: OverrideRequest,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let OverrideRequest {
            order_id,
            admin_id,
            target_stage,
            reason,
        } = request;

        let order = self.store.get_order(order_id).await?;

        let update = StageUpdate {
            order_id,
            expected_stage: order.stage,
            expected_version: order.version,
            new_stage: target_stage,
            assign_if_unset: None,
        };
        let record = StageChangeRecord {
            sequence: 0,
            order_id,
            from_stage: Some(order.stage),
            to_stage: target_stage,
            actor_id: Some(admin_id),
            actor_role: Some(ActorRole::Admin),
            kind: RecordKind::Override,
            note: Some(self.override_note(&reason)),
            recorded_at: now_iso8601(),
        };
        let (committed, record) = self.commit(update, record).await?;

        warn!(
            order_id = order_id.0,
            from = %order.stage,
            to = %committed.stage,
            role = %ActorRole::Admin,
            actor_id = admin_id.0,
            sequence = record.sequence,
            reason = %reason,
            "administrative override committed"
        );
        Ok(TransitionOutcome::committed(&committed, &record))
    }

    fn override_note(&self, reason: &str) -> String {
        let reason = reason.trim();
        if reason.is_empty() {
            self.options.override_note_prefix.clone()
        } else {
            format!("{} {}", self.options.override_note_prefix, reason)
        }
    }

    async fn commit(
        &self,
        update: StageUpdate,
        record: StageChangeRecord,
    ) -> Result<(Order, StageChangeRecord), WorkflowError> {
        match self.store.commit_transition(update, record).await {
            Ok(committed) => Ok(committed),
            Err(StorageError::ConcurrentConflict {
                order_id,
                expected_stage,
                found_stage,
                already_assigned,
                ..
            }) => {
                let reason = if already_assigned {
                    self.claimant(order_id).await
                } else {
                    ConflictReason::StaleState
                };
                warn!(
                    order_id = order_id.0,
                    expected = %expected_stage,
                    found = %found_stage,
                    reason = %reason,
                    "commit lost to a concurrent writer"
                );
                Err(WorkflowError::Conflict { order_id, reason })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn claimant(&self, order_id: OrderId) -> ConflictReason {
        match self.store.get_order(order_id).await {
            Ok(Order {
                assigned_agent: Some(by),
                ..
            }) => ConflictReason::AlreadyClaimed { by },
            _ => ConflictReason::StaleState,
        }
    }
}

/// Current UTC time as an RFC 3339 string with second precision.
pub(crate) fn now_iso8601() -> String {
    let now = time::OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
