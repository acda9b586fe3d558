//! Prompt generation: Tier 1 templates and Tier 3 milestone analysis.
//! Generators only produce gated candidates; persistence belongs to the lifecycle store.

pub mod anchor;
pub mod milestone;
pub mod template;

pub use anchor::{anchor_hash, extract_anchors, AnchorEntity};
pub use milestone::{is_milestone, MilestoneAnalyzer, MilestoneOutcome, DEFAULT_MILESTONES};
pub use template::{TemplateGenerator, TemplateOutput};

use crate::types::{MemoryType, StoryId, StorytellerId, Tier, Timestamp};
use serde::{Deserialize, Serialize};

/// A gated prompt awaiting persistence. Transient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptCandidate {
    pub storyteller_id: StorytellerId,
    /// Source story for Tier 1 candidates
    pub story_id: Option<StoryId>,
    pub text: String,
    pub tier: Tier,
    pub context_note: Option<String>,
    pub anchor_entity: Option<String>,
    pub anchor_year: Option<i32>,
    /// Idempotency key; unique per storyteller
    pub anchor_hash: String,
    pub memory_type: MemoryType,
    pub score: u32,
    pub expires_at: Timestamp,
}

/// Per-tier counts reported by `generate`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    /// Candidates that passed the quality gate
    pub produced: usize,
    /// Newly persisted records
    pub persisted: usize,
    /// Candidates whose anchor hash already existed
    pub duplicates: usize,
    /// Candidates discarded by the quality gate
    pub rejected: usize,
}

impl TierCounts {
    pub fn merge(&mut self, other: TierCounts) {
        self.produced += other.produced;
        self.persisted += other.persisted;
        self.duplicates += other.duplicates;
        self.rejected += other.rejected;
    }
}
