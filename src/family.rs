//! Family-submitted prompts: pending -> answered | archived.
//!
//! Separate from the queue state machine. Pending prompts are surfaced next to
//! the selected prompt and never compete with it.

use crate::error::EngineError;
use crate::store::{FamilyPrompt, FamilyPromptStatus, PromptStore};
use crate::types::{now, PrincipalId, PromptId, StoryId, StorytellerId};
use tracing::info;

#[derive(Clone)]
pub struct FamilyTrack {
    store: PromptStore,
}

impl FamilyTrack {
    pub fn new(store: PromptStore) -> Self {
        Self { store }
    }

    pub fn submit(
        &self,
        storyteller: &StorytellerId,
        submitted_by: &PrincipalId,
        text: &str,
    ) -> Result<FamilyPrompt, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::Validation("family prompt text is empty".to_string()));
        }
        let prompt = FamilyPrompt {
            id: PromptId(self.store.generate_id()?),
            storyteller_id: storyteller.clone(),
            submitted_by: submitted_by.clone(),
            prompt_text: text.to_string(),
            status: FamilyPromptStatus::Pending,
            created_at: now(),
            answered_at: None,
            answered_story_id: None,
            archived_at: None,
        };
        self.store.put_family_prompt(&prompt)?;
        info!(storyteller = %storyteller, prompt_id = %prompt.id, submitted_by = %submitted_by, "Family prompt submitted");
        Ok(prompt)
    }

    /// Mark a pending prompt answered, optionally linking the story that answered it
    pub fn answer(
        &self,
        storyteller: &StorytellerId,
        id: PromptId,
        story: Option<StoryId>,
    ) -> Result<FamilyPrompt, EngineError> {
        let mut prompt = self.get(storyteller, id)?;
        if prompt.status != FamilyPromptStatus::Pending {
            return Err(EngineError::Validation(format!(
                "family prompt {} is not pending",
                id
            )));
        }
        prompt.status = FamilyPromptStatus::Answered;
        prompt.answered_at = Some(now());
        prompt.answered_story_id = story;
        self.store.put_family_prompt(&prompt)?;
        info!(storyteller = %storyteller, prompt_id = %id, "Family prompt answered");
        Ok(prompt)
    }

    /// Archive a prompt. Archiving twice is a no-op.
    pub fn archive(&self, storyteller: &StorytellerId, id: PromptId) -> Result<FamilyPrompt, EngineError> {
        let mut prompt = self.get(storyteller, id)?;
        if prompt.status == FamilyPromptStatus::Archived {
            return Ok(prompt);
        }
        prompt.status = FamilyPromptStatus::Archived;
        prompt.archived_at = Some(now());
        self.store.put_family_prompt(&prompt)?;
        info!(storyteller = %storyteller, prompt_id = %id, "Family prompt archived");
        Ok(prompt)
    }

    /// Oldest first, optionally filtered by status
    pub fn list(
        &self,
        storyteller: &StorytellerId,
        status: Option<FamilyPromptStatus>,
    ) -> Result<Vec<FamilyPrompt>, EngineError> {
        let mut prompts: Vec<FamilyPrompt> = self
            .store
            .list_family_prompts(storyteller)?
            .into_iter()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .collect();
        prompts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(prompts)
    }

    pub fn pending(&self, storyteller: &StorytellerId) -> Result<Vec<FamilyPrompt>, EngineError> {
        self.list(storyteller, Some(FamilyPromptStatus::Pending))
    }

    fn get(&self, storyteller: &StorytellerId, id: PromptId) -> Result<FamilyPrompt, EngineError> {
        self.store
            .get_family_prompt(storyteller, id)?
            .ok_or_else(|| EngineError::NotFound(format!("family prompt {}", id)))
    }
}
