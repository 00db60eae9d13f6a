use orderflow_core::{describe_stages, AssignmentRule, TransitionTable};

use super::print_json;
use crate::OutputFormat;

pub(crate) fn cmd_table(table: &TransitionTable, output: OutputFormat) {
    match output {
        OutputFormat::Json => {
            let stages: Vec<_> = table.stages().collect();
            print_json(&serde_json::json!({
                "stages": stages,
                "transitions": table.transitions(),
                "terminal": table.terminal_stages(),
            }));
        }
        OutputFormat::Text => {
            println!(
                "{:<18} {:<18} {:<12} {}",
                "FROM", "TO", "ROLE", "ASSIGNMENT"
            );
            for t in table.transitions() {
                println!(
                    "{:<18} {:<18} {:<12} {}",
                    t.from.as_str(),
                    t.to.as_str(),
                    t.role.as_str(),
                    assignment_label(t.assignment)
                );
            }
            println!();
            println!("terminal stages: {}", describe_stages(&table.terminal_stages()));
        }
    }
}

fn assignment_label(rule: AssignmentRule) -> &'static str {
    match rule {
        AssignmentRule::None => "-",
        AssignmentRule::Claim => "claim",
        AssignmentRule::AssigneeOnly => "assignee-only",
    }
}
