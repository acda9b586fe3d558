//! Family track presentation.

use super::shared::{is_json, new_table, short_time, to_json};
use crate::error::EngineError;
use crate::store::{FamilyPrompt, FamilyPromptStatus};

pub fn format_family_prompt(prompt: &FamilyPrompt, format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(prompt);
    }
    Ok(format!(
        "[family {} | {}] {} (from {})",
        prompt.id,
        status_text(prompt.status),
        prompt.prompt_text,
        prompt.submitted_by
    ))
}

pub fn format_family_list(prompts: &[FamilyPrompt], format: &str) -> Result<String, EngineError> {
    if is_json(format) {
        return to_json(prompts);
    }
    if prompts.is_empty() {
        return Ok("No family prompts.".to_string());
    }
    let mut table = new_table(vec!["ID", "Status", "From", "Submitted", "Text"]);
    for prompt in prompts {
        table.add_row(vec![
            prompt.id.to_string(),
            status_text(prompt.status).to_string(),
            prompt.submitted_by.to_string(),
            short_time(prompt.created_at),
            prompt.prompt_text.clone(),
        ]);
    }
    Ok(table.to_string())
}

fn status_text(status: FamilyPromptStatus) -> &'static str {
    match status {
        FamilyPromptStatus::Pending => "pending",
        FamilyPromptStatus::Answered => "answered",
        FamilyPromptStatus::Archived => "archived",
    }
}
