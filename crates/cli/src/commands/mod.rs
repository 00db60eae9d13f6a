mod next;
mod simulate;
mod table;
mod verify;

pub(crate) use next::cmd_next;
pub(crate) use simulate::cmd_simulate;
pub(crate) use table::cmd_table;
pub(crate) use verify::cmd_verify;

use std::path::Path;
use std::process;

use serde::de::DeserializeOwned;

use crate::{report_error, OutputFormat};

/// Read and deserialize a JSON input file, exiting with status 1 on failure.
pub(crate) fn read_json_or_exit<T: DeserializeOwned>(
    path: &Path,
    output: OutputFormat,
    quiet: bool,
) -> T {
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Print a JSON value to stdout.
pub(crate) fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("serialization error: {}", e))
    );
}
