use std::collections::BTreeSet;

use orderflow_core::{describe_stages, ActorRole, Stage, TransitionTable};

use super::print_json;
use crate::OutputFormat;

/// Print the stages reachable from `stage`, optionally narrowed to one role.
pub(crate) fn cmd_next(
    table: &TransitionTable,
    stage: Stage,
    role: Option<ActorRole>,
    output: OutputFormat,
) {
    let next: BTreeSet<Stage> = match role {
        None => table.legal_next_stages(stage),
        Some(role) => table
            .transitions()
            .iter()
            .filter(|t| t.from == stage && t.role == role)
            .map(|t| t.to)
            .collect(),
    };

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "stage": stage,
            "role": role,
            "terminal": table.is_terminal(stage),
            "next": next,
        })),
        OutputFormat::Text => match role {
            Some(role) => println!("{} ({}) -> {}", stage, role, describe_stages(&next)),
            None => println!("{} -> {}", stage, describe_stages(&next)),
        },
    }
}
