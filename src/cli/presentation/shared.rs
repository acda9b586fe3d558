//! Shared presentation helpers: json rendering, headings and the prompt table.

use crate::error::EngineError;
use crate::lifecycle::{PromptLabel, PromptRecord};
use crate::types::Timestamp;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use owo_colors::OwoColorize;
use serde::Serialize;

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, EngineError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| EngineError::Validation(format!("Failed to render json: {}", e)))
}

pub fn is_json(format: &str) -> bool {
    format.eq_ignore_ascii_case("json")
}

pub fn heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

pub fn label_text(record: &PromptRecord) -> String {
    match record.label() {
        PromptLabel::Tier(tier) => tier.to_string(),
        PromptLabel::Category(Some(category)) => category.to_string(),
        PromptLabel::Category(None) => "-".to_string(),
    }
}

pub fn short_time(at: Timestamp) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

pub fn prompt_table(records: &[PromptRecord]) -> String {
    let mut table = new_table(vec!["ID", "Source", "Status", "Tier/Category", "Skips", "Position", "Text"]);
    for record in records {
        table.add_row(vec![
            record.id().to_string(),
            record.source().to_string(),
            record.status().to_string(),
            label_text(record),
            record.skip_count().to_string(),
            record
                .queue_position()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.text().to_string(),
        ]);
    }
    table.to_string()
}

/// One-line summary of a record, e.g. `[ai 12 | tier1 | queued #3] text`
pub fn prompt_line(record: &PromptRecord) -> String {
    let position = record
        .queue_position()
        .map(|p| format!(" #{}", p))
        .unwrap_or_default();
    format!(
        "[{} {} | {} | {}{}] {}",
        record.source(),
        record.id(),
        label_text(record),
        record.status(),
        position,
        record.text()
    )
}
