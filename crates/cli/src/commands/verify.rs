use std::path::Path;
use std::process;

use orderflow_core::TransitionTable;
use orderflow_engine::verify_history;
use orderflow_storage::{Order, StageChangeRecord};
use serde::Deserialize;

use super::{print_json, read_json_or_exit};
use crate::OutputFormat;

/// An exported order with its audit log.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct HistoryExport {
    pub order: Order,
    pub records: Vec<StageChangeRecord>,
}

pub(crate) fn cmd_verify(table: &TransitionTable, path: &Path, output: OutputFormat, quiet: bool) {
    let export: HistoryExport = read_json_or_exit(path, output, quiet);

    match verify_history(table, &export.order, &export.records) {
        Ok(summary) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Text => println!(
                    "valid: {} at {} ({} records, {} overrides)",
                    summary.order_id, summary.final_stage, summary.records, summary.overrides
                ),
                OutputFormat::Json => print_json(&serde_json::json!({
                    "valid": true,
                    "summary": summary,
                })),
            }
        }
        Err(violation) => {
            match output {
                OutputFormat::Text => {
                    if !quiet {
                        eprintln!("invalid history: {}", violation);
                    }
                }
                OutputFormat::Json => {
                    let json = serde_json::json!({
                        "valid": false,
                        "violation": violation.to_string(),
                    });
                    eprintln!(
                        "{}",
                        serde_json::to_string_pretty(&json).unwrap_or_default()
                    );
                }
            }
            process::exit(1);
        }
    }
}
