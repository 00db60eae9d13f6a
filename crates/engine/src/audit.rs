//! Audit log replay.
//!
//! [`verify_history`] walks an order's records from the creation event to
//! the end and checks that together they could only have been produced by
//! the engine: a continuous, gap-free chain of table-legal steps, closed at
//! terminal stages except for overrides, ending at the order's stage.
//! Overrides are only accepted from the admin role.

use orderflow_core::{ActorRole, OrderId, Stage, TransitionTable};
use orderflow_storage::{Order, RecordKind, StageChangeRecord};
use serde::Serialize;

/// The first inconsistency found in an audit log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditViolation {
    #[error("{order_id} has no audit records")]
    EmptyHistory { order_id: OrderId },

    #[error("record {sequence} belongs to {found}, not {order_id}")]
    ForeignRecord {
        order_id: OrderId,
        sequence: u64,
        found: OrderId,
    },

    #[error("first record of {order_id} is not a creation record entering {expected}")]
    MissingCreation { order_id: OrderId, expected: Stage },

    #[error("record {sequence} of {order_id} is a creation record but is not first")]
    MisplacedCreation { order_id: OrderId, sequence: u64 },

    #[error("{order_id}: expected sequence {expected}, found {found}")]
    SequenceGap {
        order_id: OrderId,
        expected: u64,
        found: u64,
    },

    #[error(
        "{order_id}: record {sequence} starts from {}, but the previous record ended at {previous}",
        describe_from(.found_from)
    )]
    BrokenChain {
        order_id: OrderId,
        sequence: u64,
        previous: Stage,
        found_from: Option<Stage>,
    },

    #[error(
        "{order_id}: record {sequence} ({from} -> {to}) is not allowed for role {}",
        describe_role(.role)
    )]
    IllegalStep {
        order_id: OrderId,
        sequence: u64,
        from: Stage,
        to: Stage,
        role: Option<ActorRole>,
    },

    #[error("{order_id}: record {sequence} leaves terminal stage {terminal} without an override")]
    AfterTerminal {
        order_id: OrderId,
        sequence: u64,
        terminal: Stage,
    },

    #[error("{order_id} is at {actual}, but its last record ends at {recorded}")]
    StageMismatch {
        order_id: OrderId,
        recorded: Stage,
        actual: Stage,
    },
}

/// Statistics of a log that passed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub order_id: OrderId,
    pub records: usize,
    pub overrides: usize,
    pub final_stage: Stage,
}

/// Replay `records` against `table` and report the first violation.
pub fn verify_history(
    table: &TransitionTable,
    order: &Order,
    records: &[StageChangeRecord],
) -> Result<AuditSummary, AuditViolation> {
    let order_id = order.id;
    let (first, rest) = records
        .split_first()
        .ok_or(AuditViolation::EmptyHistory { order_id })?;

    check_identity(order_id, first, 1)?;
    if first.kind != RecordKind::Created
        || first.from_stage.is_some()
        || first.to_stage != Stage::INITIAL
    {
        return Err(AuditViolation::MissingCreation {
            order_id,
            expected: Stage::INITIAL,
        });
    }

    let mut current = first.to_stage;
    let mut overrides = 0;
    for (idx, record) in rest.iter().enumerate() {
        let sequence = idx as u64 + 2;
        check_identity(order_id, record, sequence)?;

        if record.from_stage != Some(current) {
            return Err(AuditViolation::BrokenChain {
                order_id,
                sequence,
                previous: current,
                found_from: record.from_stage,
            });
        }

        match record.kind {
            RecordKind::Created => {
                return Err(AuditViolation::MisplacedCreation { order_id, sequence });
            }
            RecordKind::Override => {
                if record.actor_role != Some(ActorRole::Admin) {
                    return Err(AuditViolation::IllegalStep {
                        order_id,
                        sequence,
                        from: current,
                        to: record.to_stage,
                        role: record.actor_role,
                    });
                }
                overrides += 1;
            }
            RecordKind::Workflow => {
                if table.is_terminal(current) {
                    return Err(AuditViolation::AfterTerminal {
                        order_id,
                        sequence,
                        terminal: current,
                    });
                }
                let legal = record
                    .actor_role
                    .is_some_and(|role| table.is_allowed(current, record.to_stage, role));
                if !legal {
                    return Err(AuditViolation::IllegalStep {
                        order_id,
                        sequence,
                        from: current,
                        to: record.to_stage,
                        role: record.actor_role,
                    });
                }
            }
        }
        current = record.to_stage;
    }

    if current != order.stage {
        return Err(AuditViolation::StageMismatch {
            order_id,
            recorded: current,
            actual: order.stage,
        });
    }

    Ok(AuditSummary {
        order_id,
        records: records.len(),
        overrides,
        final_stage: current,
    })
}

fn check_identity(
    order_id: OrderId,
    record: &StageChangeRecord,
    expected: u64,
) -> Result<(), AuditViolation> {
    if record.order_id != order_id {
        return Err(AuditViolation::ForeignRecord {
            order_id,
            sequence: record.sequence,
            found: record.order_id,
        });
    }
    if record.sequence != expected {
        return Err(AuditViolation::SequenceGap {
            order_id,
            expected,
            found: record.sequence,
        });
    }
    Ok(())
}

fn describe_from(stage: &Option<Stage>) -> String {
    stage.map_or_else(|| "no stage".to_string(), |s| s.to_string())
}

fn describe_role(role: &Option<ActorRole>) -> String {
    role.map_or_else(|| "(none)".to_string(), |r| format!("'{}'", r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_core::ActorId;

    fn order(stage: Stage) -> Order {
        Order {
            id: OrderId(1),
            stage,
            assigned_agent: None,
            customer_id: None,
            restaurant_id: None,
            version: 0,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn created() -> StageChangeRecord {
        StageChangeRecord {
            sequence: 1,
            order_id: OrderId(1),
            from_stage: None,
            to_stage: Stage::Placed,
            actor_id: None,
            actor_role: None,
            kind: RecordKind::Created,
            note: None,
            recorded_at: String::new(),
        }
    }

    fn step(sequence: u64, from: Stage, to: Stage, role: ActorRole) -> StageChangeRecord {
        StageChangeRecord {
            sequence,
            from_stage: Some(from),
            to_stage: to,
            actor_id: Some(ActorId(9)),
            actor_role: Some(role),
            kind: RecordKind::Workflow,
            ..created()
        }
    }

    fn admin(sequence: u64, from: Stage, to: Stage) -> StageChangeRecord {
        StageChangeRecord {
            kind: RecordKind::Override,
            ..step(sequence, from, to, ActorRole::Admin)
        }
    }

    #[test]
    fn valid_history_passes() {
        let table = TransitionTable::standard();
        let records = vec![
            created(),
            step(2, Stage::Placed, Stage::Confirmed, ActorRole::Restaurant),
            step(3, Stage::Confirmed, Stage::Cancelled, ActorRole::Customer),
        ];
        let summary = verify_history(&table, &order(Stage::Cancelled), &records).unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.overrides, 0);
        assert_eq!(summary.final_stage, Stage::Cancelled);
    }

    #[test]
    fn empty_history_rejected() {
        let table = TransitionTable::standard();
        assert_eq!(
            verify_history(&table, &order(Stage::Placed), &[]),
            Err(AuditViolation::EmptyHistory { order_id: OrderId(1) })
        );
    }

    #[test]
    fn history_must_start_with_creation() {
        let table = TransitionTable::standard();
        let mut first = step(1, Stage::Placed, Stage::Confirmed, ActorRole::Restaurant);
        first.from_stage = None;
        let err = verify_history(&table, &order(Stage::Confirmed), &[first]).unwrap_err();
        assert!(matches!(err, AuditViolation::MissingCreation { .. }));
    }

    #[test]
    fn sequence_gap_detected() {
        let table = TransitionTable::standard();
        let records = vec![
            created(),
            step(3, Stage::Placed, Stage::Confirmed, ActorRole::Restaurant),
        ];
        let err = verify_history(&table, &order(Stage::Confirmed), &records).unwrap_err();
        assert_eq!(
            err,
            AuditViolation::SequenceGap {
                order_id: OrderId(1),
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn broken_chain_detected() {
        let table = TransitionTable::standard();
        let records = vec![
            created(),
            step(2, Stage::Confirmed, Stage::Preparing, ActorRole::Restaurant),
        ];
        let err = verify_history(&table, &order(Stage::Preparing), &records).unwrap_err();
        assert!(matches!(
            err,
            AuditViolation::BrokenChain { previous: Stage::Placed, .. }
        ));
    }

    #[test]
    fn wrong_role_is_illegal_step() {
        let table = TransitionTable::standard();
        let records = vec![
            created(),
            step(2, Stage::Placed, Stage::Confirmed, ActorRole::Customer),
        ];
        let err = verify_history(&table, &order(Stage::Confirmed), &records).unwrap_err();
        assert!(matches!(err, AuditViolation::IllegalStep { sequence: 2, .. }));
        assert!(err.to_string().contains("'customer'"), "{err}");
    }

    #[test]
    fn workflow_record_after_terminal_rejected() {
        let table = TransitionTable::standard();
        let records = vec![
            created(),
            step(2, Stage::Placed, Stage::Cancelled, ActorRole::Customer),
            step(3, Stage::Cancelled, Stage::Confirmed, ActorRole::Restaurant),
        ];
        let err = verify_history(&table, &order(Stage::Confirmed), &records).unwrap_err();
        assert!(matches!(
            err,
            AuditViolation::AfterTerminal { terminal: Stage::Cancelled, .. }
        ));
    }

    #[test]
    fn override_may_leave_terminal() {
        let table = TransitionTable::standard();
        let records = vec![
            created(),
            step(2, Stage::Placed, Stage::Cancelled, ActorRole::Customer),
            admin(3, Stage::Cancelled, Stage::Confirmed),
            step(4, Stage::Confirmed, Stage::Preparing, ActorRole::Restaurant),
        ];
        let summary = verify_history(&table, &order(Stage::Preparing), &records).unwrap();
        assert_eq!(summary.overrides, 1);
    }

    #[test]
    fn override_by_non_admin_is_illegal_step() {
        let table = TransitionTable::standard();
        let mut forged = admin(2, Stage::Placed, Stage::PickedUp);
        forged.actor_role = Some(ActorRole::Driver);
        let records = vec![created(), forged];
        let err = verify_history(&table, &order(Stage::PickedUp), &records).unwrap_err();
        assert!(matches!(
            err,
            AuditViolation::IllegalStep {
                sequence: 2,
                role: Some(ActorRole::Driver),
                ..
            }
        ));

        let mut anonymous = admin(2, Stage::Placed, Stage::PickedUp);
        anonymous.actor_role = None;
        let err = verify_history(&table, &order(Stage::PickedUp), &[created(), anonymous])
            .unwrap_err();
        assert!(matches!(err, AuditViolation::IllegalStep { role: None, .. }));
    }

    #[test]
    fn final_stage_must_match_order() {
        let table = TransitionTable::standard();
        let records = vec![
            created(),
            step(2, Stage::Placed, Stage::Confirmed, ActorRole::Restaurant),
        ];
        let err = verify_history(&table, &order(Stage::Preparing), &records).unwrap_err();
        assert!(matches!(
            err,
            AuditViolation::StageMismatch {
                recorded: Stage::Confirmed,
                actual: Stage::Preparing,
                ..
            }
        ));
    }

    #[test]
    fn foreign_record_detected() {
        let table = TransitionTable::standard();
        let mut other = step(2, Stage::Placed, Stage::Confirmed, ActorRole::Restaurant);
        other.order_id = OrderId(2);
        let err = verify_history(&table, &order(Stage::Confirmed), &[created(), other]).unwrap_err();
        assert!(matches!(err, AuditViolation::ForeignRecord { found, .. } if found == OrderId(2)));
    }
}
