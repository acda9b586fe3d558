//! Story and generation presentation.

use super::shared::{is_json, new_table, short_time, to_json};
use crate::api::GenerateReport;
use crate::error::EngineError;
use crate::generation::{MilestoneOutcome, TierCounts};
use crate::story::Story;
use serde_json::json;

pub fn format_generate_report(report: &GenerateReport, format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(report);
    }
    let mut output = format!(
        "Tier 1: {}\nTier 3: {}",
        counts_line(&report.tier1),
        counts_line(&report.tier3)
    );
    if let Some(outcome) = &report.milestone {
        output.push_str(&format!("\nMilestone: {}", milestone_line(outcome)));
    }
    if report.failed_stories > 0 {
        output.push_str(&format!(
            "\n{} stories failed Tier 1 generation (see logs)",
            report.failed_stories
        ));
    }
    Ok(output)
}

pub fn format_story_added(
    story: &Story,
    report: Option<&GenerateReport>,
    format: &str,
) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(&json!({ "story": story, "generation": report }));
    }
    let mut output = format!("Recorded story {} for {}", story.id, story.storyteller_id);
    if story.is_private {
        output.push_str(" (private)");
    }
    if let Some(report) = report {
        output.push('\n');
        output.push_str(&format_generate_report(report, format)?);
    }
    Ok(output)
}

pub fn format_story_list(stories: &[Story], format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(stories);
    }
    if stories.is_empty() {
        return Ok("No stories recorded.".to_string());
    }
    let mut table = new_table(vec!["ID", "Created", "Title", "Year", "Private", "Words"]);
    for story in stories {
        table.add_row(vec![
            story.id.to_string(),
            short_time(story.created_at),
            story.title.clone().unwrap_or_else(|| "-".to_string()),
            story
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "-".to_string()),
            if story.is_private { "yes" } else { "no" }.to_string(),
            story.transcript.split_whitespace().count().to_string(),
        ]);
    }
    Ok(table.to_string())
}

fn counts_line(counts: &TierCounts) -> String {
    format!(
        "{} produced, {} persisted, {} duplicates, {} rejected",
        counts.produced, counts.persisted, counts.duplicates, counts.rejected
    )
}

fn milestone_line(outcome: &MilestoneOutcome) -> String {
    match outcome {
        MilestoneOutcome::NotMilestone { eligible } => {
            format!("{} eligible stories is not a milestone", eligible)
        }
        MilestoneOutcome::Disabled { milestone } => {
            format!("reached {} but no provider is configured", milestone)
        }
        MilestoneOutcome::AlreadyClaimed { milestone } => {
            format!("{} already analyzed", milestone)
        }
        MilestoneOutcome::Completed { milestone, insights, .. } => {
            format!("{} analyzed, {} insights", milestone, insights)
        }
        MilestoneOutcome::Failed { milestone, reason } => match milestone {
            Some(m) => format!("{} failed: {}", m, reason),
            None => format!("failed: {}", reason),
        },
    }
}
