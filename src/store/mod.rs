//! Prompt Store
//!
//! Durable record shapes for every partition the engine persists, plus the
//! sled-backed store handle. Every record is scoped by storyteller id; keys are
//! `storyteller \0 suffix` so per-storyteller scans are prefix scans.

pub mod persistence;

pub use persistence::PromptStore;

use crate::types::{
    MemoryType, PrincipalId, PromptId, PromptSource, PromptStatus, StoryId, StorytellerId, Tier,
    Timestamp,
};
use serde::{Deserialize, Serialize};

/// Generated prompt (Tier 1 or Tier 3)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiPrompt {
    pub id: PromptId,
    pub storyteller_id: StorytellerId,
    #[serde(default)]
    pub story_id: Option<StoryId>,
    pub tier: Tier,
    pub prompt_text: String,
    #[serde(default)]
    pub context_note: Option<String>,
    #[serde(default)]
    pub anchor_entity: Option<String>,
    #[serde(default)]
    pub anchor_year: Option<i32>,
    pub anchor_hash: String,
    pub memory_type: MemoryType,
    pub score: u32,
    pub status: PromptStatus,
    /// Records written without a counter read back as zero skips
    #[serde(default)]
    pub skip_count: u32,
    #[serde(default)]
    pub shown_count: u32,
    #[serde(default)]
    pub queue_position: Option<u64>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub queued_at: Option<Timestamp>,
    #[serde(default)]
    pub dismissed_at: Option<Timestamp>,
    #[serde(default)]
    pub last_shown_at: Option<Timestamp>,
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

/// Catalog prompt the storyteller has queued or dismissed. Unique by (storyteller, text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPrompt {
    pub id: PromptId,
    pub storyteller_id: StorytellerId,
    pub prompt_text: String,
    #[serde(default)]
    pub category: Option<String>,
    pub status: PromptStatus,
    #[serde(default)]
    pub skip_count: u32,
    #[serde(default)]
    pub queue_position: Option<u64>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub queued_at: Option<Timestamp>,
    #[serde(default)]
    pub dismissed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyPromptStatus {
    Pending,
    Answered,
    Archived,
}

/// Prompt written by a family member for the storyteller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyPrompt {
    pub id: PromptId,
    pub storyteller_id: StorytellerId,
    pub submitted_by: PrincipalId,
    pub prompt_text: String,
    pub status: FamilyPromptStatus,
    pub created_at: Timestamp,
    #[serde(default)]
    pub answered_at: Option<Timestamp>,
    #[serde(default)]
    pub answered_story_id: Option<StoryId>,
    #[serde(default)]
    pub archived_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOutcome {
    Skipped,
}

impl std::fmt::Display for HistoryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryOutcome::Skipped => f.write_str("skipped"),
        }
    }
}

/// Append-only record of a retired prompt. Never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: u64,
    pub storyteller_id: StorytellerId,
    pub source: PromptSource,
    pub original_prompt_id: PromptId,
    pub prompt_text: String,
    pub tier: Option<Tier>,
    pub category: Option<String>,
    pub score: Option<u32>,
    pub outcome: HistoryOutcome,
    pub skip_count: u32,
    pub archived_at: Timestamp,
}

/// Character insight produced alongside Tier 3 prompts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    pub id: u64,
    pub storyteller_id: StorytellerId,
    pub milestone: u32,
    pub insight_type: String,
    pub content: String,
    #[serde(default)]
    pub confidence: Option<f32>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Running,
    Completed,
}

/// Insert-first-wins marker for one (storyteller, milestone) analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneClaim {
    pub storyteller_id: StorytellerId,
    pub milestone: u32,
    pub status: ClaimStatus,
    pub claimed_at: Timestamp,
    #[serde(default)]
    pub finished_at: Option<Timestamp>,
    #[serde(default)]
    pub prompts_persisted: usize,
}

/// Outcome of a unique-keyed insert
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome<T> {
    Inserted(T),
    /// The unique key already existed; the existing record id is returned
    Duplicate(PromptId),
}

impl<T> InsertOutcome<T> {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}
