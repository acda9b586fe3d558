//! Quality gate and catalog presentation.

use super::shared::{heading, is_json, new_table, to_json};
use crate::catalog::CatalogEntry;
use crate::error::EngineError;
use crate::quality::{GateCheck, QualityReport};
use owo_colors::OwoColorize;
use serde_json::json;

pub fn format_quality_report(text: &str, report: &QualityReport, format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(&json!({ "text": text, "valid": report.is_valid(), "report": report }));
    }
    let verdict = if report.is_valid() {
        format!("{}", "PASS".green().bold())
    } else {
        format!("{}", "FAIL".red().bold())
    };
    let mut output = format!(
        "{} {}\nScore: {}  Words: {}",
        heading("Quality gate"),
        verdict,
        report.score,
        report.word_count
    );
    for issue in &report.issues {
        output.push_str(&format!("\n  {} {}", "✗".red(), issue.message));
    }
    for warning in &report.warnings {
        output.push_str(&format!("\n  {} {}", "!".yellow(), warning.message));
    }
    for check in &report.passed_checks {
        output.push_str(&format!("\n  {} {}", "✓".green(), check_name(*check)));
    }
    Ok(output)
}

pub fn format_catalog_entries(entries: &[CatalogEntry], format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(entries);
    }
    if entries.is_empty() {
        return Ok("No catalog prompts in that category.".to_string());
    }
    let mut table = new_table(vec!["Category", "Prompt"]);
    for entry in entries {
        table.add_row(vec![entry.category.clone(), entry.text.clone()]);
    }
    Ok(table.to_string())
}

fn check_name(check: GateCheck) -> &'static str {
    match check {
        GateCheck::WordCount => "word count",
        GateCheck::GenericNouns => "no generic nouns",
        GateCheck::BannedPhrases => "no banned phrases",
        GateCheck::QuestionMark => "ends as a question",
        GateCheck::EmotionalDepth => "emotional depth",
        GateCheck::QuotedPhrase => "quotes the story",
    }
}
