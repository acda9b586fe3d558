//! Init and outbox presentation.

use super::shared::{is_json, new_table, short_time, to_json};
use crate::error::EngineError;
use crate::outbox::{DispatchReport, OutboxTask, TaskStatus};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct InitSummary {
    pub config_path: PathBuf,
    /// False when an existing config was kept
    pub config_written: bool,
    pub overwritten: bool,
    pub store_path: PathBuf,
}

pub fn format_init_summary(summary: &InitSummary, format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(summary);
    }
    let mut output = String::from("Initializing storyprompt workspace...\n\n");
    let config = summary.config_path.display();
    match (summary.config_written, summary.overwritten) {
        (true, true) => output.push_str(&format!("  ✓ {} (overwritten)\n", config)),
        (true, false) => output.push_str(&format!("  ✓ {}\n", config)),
        (false, _) => output.push_str(&format!(
            "  ⊘ {} (already exists, skipped; use --force to overwrite)\n",
            config
        )),
    }
    output.push_str(&format!("  ✓ store at {}\n", summary.store_path.display()));
    Ok(output)
}

pub fn format_outbox_tasks(tasks: &[OutboxTask], format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(tasks);
    }
    if tasks.is_empty() {
        return Ok("Outbox is empty.".to_string());
    }
    let mut table = new_table(vec!["ID", "Kind", "Storyteller", "Status", "Attempts", "Created", "Last error"]);
    for task in tasks {
        table.add_row(vec![
            task.id.to_string(),
            task.event.kind().to_string(),
            task.event.storyteller_id().to_string(),
            match task.status {
                TaskStatus::Pending => "pending",
                TaskStatus::DeadLettered => "dead-lettered",
            }
            .to_string(),
            task.attempts.to_string(),
            short_time(task.created_at),
            task.last_error.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_dispatch_report(report: &DispatchReport, format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(report);
    }
    Ok(format!(
        "Delivered {}, retrying {}, dead-lettered {}",
        report.delivered, report.retried, report.dead_lettered
    ))
}
