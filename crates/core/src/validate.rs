//! Transition validation over a [`TransitionTable`].
//!
//! Validation is a pure function: it never reads or writes order state.
//! A denial carries everything a caller needs to render a precise message.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::stage::{ActorRole, Stage};
use crate::table::{AssignmentRule, TransitionTable};

/// Why a requested stage move was refused by the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionDenied {
    pub current: Stage,
    pub attempted: Stage,
    pub role: ActorRole,
    /// Every stage reachable from `current` by any role.
    pub legal_next: BTreeSet<Stage>,
}

impl fmt::Display for TransitionDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} is not allowed for role '{}'; valid transitions from {} are: {}",
            self.current,
            self.attempted,
            self.role,
            self.current,
            describe_stages(&self.legal_next)
        )
    }
}

impl std::error::Error for TransitionDenied {}

/// Check `(from, to, role)` against the table.
///
/// Returns the assignment rule of the matching triple on success.
pub fn validate(
    table: &TransitionTable,
    from: Stage,
    to: Stage,
    role: ActorRole,
) -> Result<AssignmentRule, TransitionDenied> {
    table
        .rule_for(from, to, role)
        .ok_or_else(|| TransitionDenied {
            current: from,
            attempted: to,
            role,
            legal_next: table.legal_next_stages(from),
        })
}

/// Comma-separated stage list, or `none (terminal stage)` when empty.
pub fn describe_stages(stages: &BTreeSet<Stage>) -> String {
    if stages.is_empty() {
        return "none (terminal stage)".to_string();
    }
    stages
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
