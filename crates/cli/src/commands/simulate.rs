//! `orderflow simulate`: replay a scripted request stream against an
//! in-memory engine.
//!
//! # Script format
//!
//! ```json
//! { "steps": [
//!     { "place":      { "order_id": 1, "customer_id": 7, "restaurant_id": 3 } },
//!     { "transition": { "order_id": 1, "actor_role": "restaurant", "actor_id": 3,
//!                       "desired_stage": "CONFIRMED" } },
//!     { "override":   { "order_id": 1, "admin_id": 1, "target_stage": "PLACED",
//!                       "reason": "re-open" } }
//! ] }
//! ```
//!
//! Rejected steps are part of the output, not failures. The command exits
//! with status 1 when the script cannot be read, when `--strict` is given and
//! a step was rejected, or when a resulting history fails verification.

use std::collections::BTreeSet;
use std::path::Path;
use std::process;
use std::sync::Arc;

use orderflow_core::{OrderId, TransitionTable};
use orderflow_engine::{
    verify_history, AuditSummary, AuditViolation, EngineOptions, NewOrder, OverrideRequest,
    TransitionRequest, WorkflowEngine, WorkflowError,
};
use orderflow_storage::{MemoryStore, Order, RecordKind, StageChangeRecord};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{print_json, read_json_or_exit};
use crate::{report_error, OutputFormat};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Script {
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Step {
    Place(NewOrder),
    Transition(TransitionRequest),
    Override(OverrideRequest),
}

impl Step {
    fn order_id(&self) -> OrderId {
        match self {
            Step::Place(p) => p.order_id,
            Step::Transition(t) => t.order_id,
            Step::Override(o) => o.order_id,
        }
    }
}

/// What happened to one step.
struct StepReport {
    index: usize,
    order_id: OrderId,
    result: Result<Value, WorkflowError>,
    summary: String,
}

pub(crate) fn cmd_simulate(
    table: TransitionTable,
    options: EngineOptions,
    path: &Path,
    strict: bool,
    output: OutputFormat,
    quiet: bool,
) {
    let script: Script = read_json_or_exit(path, output, quiet);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start runtime: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let engine =
        WorkflowEngine::with_table(Arc::new(table), MemoryStore::new()).with_options(options);
    let (reports, orders) = runtime.block_on(run_script(&engine, script));

    let rejected = reports.iter().filter(|r| r.result.is_err()).count();
    let mut audit_failures = 0;
    let mut order_values = Vec::new();

    if !quiet && output == OutputFormat::Text {
        for report in &reports {
            println!("step {}: {} {}", report.index, report.order_id, report.summary);
        }
    }

    for (order, history) in &orders {
        let audit = verify_history(engine.table(), order, history);
        if audit.is_err() {
            audit_failures += 1;
        }
        match output {
            OutputFormat::Text => {
                if !quiet {
                    print_history(order, history, &audit);
                }
            }
            OutputFormat::Json => order_values.push(json!({
                "order": order,
                "history": history,
                "audit": match &audit {
                    Ok(summary) => json!({ "valid": true, "summary": summary }),
                    Err(v) => json!({ "valid": false, "violation": v.to_string() }),
                },
            })),
        }
    }

    if output == OutputFormat::Json {
        let steps: Vec<Value> = reports
            .iter()
            .map(|r| match &r.result {
                Ok(outcome) => json!({ "step": r.index, "ok": true, "outcome": outcome }),
                Err(e) => json!({
                    "step": r.index,
                    "ok": false,
                    "error": {
                        "kind": e.kind(),
                        "message": e.to_string(),
                        "retryable": e.is_retryable(),
                    },
                }),
            })
            .collect();
        print_json(&json!({
            "steps": steps,
            "rejected": rejected,
            "orders": order_values,
        }));
    }

    if audit_failures > 0 {
        report_error(
            &format!("{} order histories failed verification", audit_failures),
            output,
            quiet,
        );
        process::exit(1);
    }
    if strict && rejected > 0 {
        report_error(&format!("{} steps were rejected", rejected), output, quiet);
        process::exit(1);
    }
}

async fn run_script(
    engine: &WorkflowEngine<MemoryStore>,
    script: Script,
) -> (Vec<StepReport>, Vec<(Order, Vec<StageChangeRecord>)>) {
    let mut touched = BTreeSet::new();
    let mut reports = Vec::with_capacity(script.steps.len());

    for (idx, step) in script.steps.into_iter().enumerate() {
        let order_id = step.order_id();
        touched.insert(order_id);
        let (result, summary) = match step {
            Step::Place(new_order) => match engine.place_order(new_order).await {
                Ok(order) => (Ok(json!(order)), format!("placed at {}", order.stage)),
                Err(e) => rejection(e),
            },
            Step::Transition(request) => {
                let label = format!(
                    "{} ({} {})",
                    request.desired_stage, request.actor_role, request.actor_id
                );
                match engine.request_transition(request).await {
                    Ok(outcome) => {
                        let summary = format!(
                            "{} -> {}, sequence {}",
                            outcome.previous_stage, label, outcome.sequence
                        );
                        (Ok(json!(outcome)), summary)
                    }
                    Err(e) => rejection(e),
                }
            }
            Step::Override(request) => match engine.override_stage(request).await {
                Ok(outcome) => {
                    let summary = format!(
                        "{} -> {} (override), sequence {}",
                        outcome.previous_stage, outcome.new_stage, outcome.sequence
                    );
                    (Ok(json!(outcome)), summary)
                }
                Err(e) => rejection(e),
            },
        };
        reports.push(StepReport {
            index: idx + 1,
            order_id,
            result,
            summary,
        });
    }

    let mut orders = Vec::new();
    for order_id in touched {
        // Orders whose placement was rejected do not exist.
        let Ok(order) = engine.get_order(order_id).await else {
            continue;
        };
        let Ok(history) = engine.history(order_id).await else {
            continue;
        };
        orders.push((order, history));
    }
    (reports, orders)
}

fn rejection(e: WorkflowError) -> (Result<Value, WorkflowError>, String) {
    let summary = format!("rejected ({}): {}", e.kind(), e);
    (Err(e), summary)
}

fn print_history(
    order: &Order,
    history: &[StageChangeRecord],
    audit: &Result<AuditSummary, AuditViolation>,
) {
    let agent = order
        .assigned_agent
        .map_or_else(|| "none".to_string(), |a| a.to_string());
    println!();
    println!("{} [{}] agent: {}", order.id, order.stage, agent);
    for r in history {
        let from = r.from_stage.map_or("-", |s| s.as_str());
        let actor = match (r.actor_role, r.actor_id) {
            (Some(role), Some(id)) => format!("{} {}", role, id),
            _ => "system".to_string(),
        };
        let kind = match r.kind {
            RecordKind::Created => "created",
            RecordKind::Workflow => "workflow",
            RecordKind::Override => "override",
        };
        match &r.note {
            Some(note) => println!(
                "  #{} {} -> {} {} by {}: {}",
                r.sequence, from, r.to_stage, kind, actor, note
            ),
            None => println!("  #{} {} -> {} {} by {}", r.sequence, from, r.to_stage, kind, actor),
        }
    }
    match audit {
        Ok(summary) => println!(
            "  audit: ok ({} records, {} overrides)",
            summary.records, summary.overrides
        ),
        Err(v) => println!("  audit: FAILED: {}", v),
    }
}
