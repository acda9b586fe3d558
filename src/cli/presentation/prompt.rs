//! Prompt presentation: next, queue actions, listings, history and insights.

use super::shared::{heading, is_json, new_table, prompt_line, prompt_table, short_time, to_json};
use crate::api::NextPrompt;
use crate::error::EngineError;
use crate::lifecycle::{PromptRecord, SkipOutcome};
use crate::queue::{DismissOutcome, QueueOutcome, Resolved};
use crate::store::{HistoryRecord, InsightRecord};
use owo_colors::OwoColorize;
use serde_json::json;

pub fn format_next(next: &NextPrompt, format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(next);
    }
    let mut output = match &next.prompt {
        Some(record) => format!("{}\n{}", heading("Next prompt"), prompt_line(record)),
        None => "No prompt available.".to_string(),
    };
    if !next.family.is_empty() {
        output.push_str(&format!("\n\n{}", heading("From family")));
        for prompt in &next.family {
            output.push_str(&format!(
                "\n  [family {}] {} ({})",
                prompt.id, prompt.prompt_text, prompt.submitted_by
            ));
        }
    }
    Ok(output)
}

pub fn format_prompt_list(
    records: &[PromptRecord],
    format: &str,
    empty_message: &str,
) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(records);
    }
    if records.is_empty() {
        return Ok(empty_message.to_string());
    }
    Ok(prompt_table(records))
}

pub fn format_queue_outcome(outcome: &QueueOutcome, format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(outcome);
    }
    Ok(format!("{}: {}", outcome.message(), prompt_line(outcome.record())))
}

pub fn format_dismiss(resolved: &Resolved<DismissOutcome>, format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(&json!({ "outcome": resolved.outcome, "next": resolved.next }));
    }
    Ok(format!(
        "{}: {}{}",
        resolved.outcome.message(),
        prompt_line(resolved.outcome.record()),
        next_suffix(resolved.next.as_ref())
    ))
}

pub fn format_skip(resolved: &Resolved<SkipOutcome>, format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(&json!({ "outcome": resolved.outcome, "next": resolved.next }));
    }
    let line = match &resolved.outcome {
        SkipOutcome::Counted(record) => format!(
            "skipped ({} of 3): {}",
            record.skip_count(),
            prompt_line(record)
        ),
        SkipOutcome::Retired(entry) => format!(
            "{} after {} skips: {}",
            "retired".yellow(),
            entry.skip_count,
            entry.prompt_text
        ),
    };
    Ok(format!("{}{}", line, next_suffix(resolved.next.as_ref())))
}

pub fn format_deleted(record: &PromptRecord, format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(&json!({ "deleted": record }));
    }
    Ok(format!("deleted: {}", prompt_line(record)))
}

pub fn format_history(entries: &[HistoryRecord], format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(entries);
    }
    if entries.is_empty() {
        return Ok("No retired prompts.".to_string());
    }
    let mut table = new_table(vec!["Archived", "Source", "Prompt ID", "Outcome", "Skips", "Text"]);
    for entry in entries {
        table.add_row(vec![
            short_time(entry.archived_at),
            entry.source.to_string(),
            entry.original_prompt_id.to_string(),
            entry.outcome.to_string(),
            entry.skip_count.to_string(),
            entry.prompt_text.clone(),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_insights(insights: &[InsightRecord], format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(insights);
    }
    if insights.is_empty() {
        return Ok("No insights yet.".to_string());
    }
    let mut table = new_table(vec!["Milestone", "Type", "Confidence", "Insight"]);
    for insight in insights {
        table.add_row(vec![
            insight.milestone.to_string(),
            insight.insight_type.clone(),
            insight
                .confidence
                .map(|c| format!("{:.2}", c))
                .unwrap_or_else(|| "-".to_string()),
            insight.content.clone(),
        ]);
    }
    Ok(table.to_string())
}

fn next_suffix(next: Option<&PromptRecord>) -> String {
    match next {
        Some(record) => format!("\nnext: {}", prompt_line(record)),
        None => "\nnext: none".to_string(),
    }
}
