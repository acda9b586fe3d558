//! Tier 3 milestone analysis
//!
//! Runs only when a storyteller's eligible story count lands exactly on a
//! milestone. A claim record is taken before the provider call so concurrent
//! requests at the same count cannot both run the analysis. Every failure is
//! logged and folded into the outcome; this path never errors to its caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{EngineError, ProviderError};
use crate::generation::anchor::anchor_hash;
use crate::generation::{PromptCandidate, TierCounts};
use crate::lifecycle::LifecycleStore;
use crate::provider::{AnalysisResponse, CandidateMeta, StoryAnalyzer};
use crate::quality;
use crate::store::{InsertOutcome, InsightRecord};
use crate::story::{eligible_in_creation_order, Story};
use crate::types::{now, MemoryType, StorytellerId, Tier};

pub const DEFAULT_MILESTONES: [u32; 11] = [1, 2, 3, 4, 7, 10, 15, 20, 30, 50, 100];
pub const DEFAULT_EXPIRY_DAYS: i64 = 30;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// True iff `count` is exactly one of `milestones`
pub fn is_milestone(count: usize, milestones: &[u32]) -> bool {
    u32::try_from(count).map_or(false, |c| milestones.contains(&c))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MilestoneOutcome {
    /// Eligible count is not a milestone
    NotMilestone { eligible: usize },
    /// No provider configured
    Disabled { milestone: u32 },
    /// Another run holds (or completed) the claim for this milestone
    AlreadyClaimed { milestone: u32 },
    Completed {
        milestone: u32,
        counts: TierCounts,
        insights: usize,
    },
    /// The run failed closed and released its claim
    Failed { milestone: Option<u32>, reason: String },
}

impl MilestoneOutcome {
    pub fn counts(&self) -> TierCounts {
        match self {
            MilestoneOutcome::Completed { counts, .. } => *counts,
            _ => TierCounts::default(),
        }
    }
}

pub struct MilestoneAnalyzer {
    lifecycle: LifecycleStore,
    analyzer: Option<Arc<dyn StoryAnalyzer>>,
    milestones: Vec<u32>,
    timeout: Duration,
    expiry: ChronoDuration,
}

impl MilestoneAnalyzer {
    pub fn new(lifecycle: LifecycleStore, analyzer: Option<Arc<dyn StoryAnalyzer>>) -> Self {
        Self {
            lifecycle,
            analyzer,
            milestones: DEFAULT_MILESTONES.to_vec(),
            timeout: DEFAULT_TIMEOUT,
            expiry: ChronoDuration::days(DEFAULT_EXPIRY_DAYS),
        }
    }

    pub fn with_milestones(mut self, milestones: Vec<u32>) -> Self {
        self.milestones = milestones;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_expiry_days(mut self, days: i64) -> Self {
        self.expiry = ChronoDuration::days(days);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.analyzer.is_some()
    }

    /// Age after which a `Running` claim is treated as abandoned
    fn stale_claim_after(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.timeout * 2).unwrap_or_else(|_| chrono::Duration::days(1))
    }

    /// Check the milestone trigger for a storyteller and run the analysis if it fires.
    pub async fn run(&self, storyteller: &StorytellerId) -> MilestoneOutcome {
        let stories = match self.lifecycle.store().list_stories(storyteller) {
            Ok(stories) => eligible_in_creation_order(stories),
            Err(e) => {
                warn!(storyteller = %storyteller, error = %e, "Tier 3 skipped: could not load stories");
                return MilestoneOutcome::Failed {
                    milestone: None,
                    reason: e.to_string(),
                };
            }
        };

        let eligible = stories.len();
        if !is_milestone(eligible, &self.milestones) {
            debug!(storyteller = %storyteller, eligible, "Not a milestone count");
            return MilestoneOutcome::NotMilestone { eligible };
        }
        // is_milestone guarantees the count fits
        let milestone = eligible as u32;

        let Some(analyzer) = &self.analyzer else {
            info!(storyteller = %storyteller, milestone, "Tier 3 disabled: no provider configured");
            return MilestoneOutcome::Disabled { milestone };
        };

        match self
            .lifecycle
            .store()
            .try_claim_milestone(storyteller, milestone, self.stale_claim_after())
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(storyteller = %storyteller, milestone, "Milestone already claimed");
                return MilestoneOutcome::AlreadyClaimed { milestone };
            }
            Err(e) => {
                warn!(storyteller = %storyteller, milestone, error = %e, "Tier 3 skipped: claim failed");
                return MilestoneOutcome::Failed {
                    milestone: Some(milestone),
                    reason: e.to_string(),
                };
            }
        }

        info!(storyteller = %storyteller, milestone, stories = eligible, "Running milestone analysis");
        let response = match self.call_provider(analyzer.as_ref(), &stories, milestone).await {
            Ok(response) => response,
            Err(e) => {
                warn!(storyteller = %storyteller, milestone, error = %e, "Milestone analysis failed");
                self.release(storyteller, milestone);
                return MilestoneOutcome::Failed {
                    milestone: Some(milestone),
                    reason: e.to_string(),
                };
            }
        };

        let counts = self.persist_prompts(storyteller, milestone, &response);
        let insights = self.persist_insights(storyteller, milestone, &response);

        if let Err(e) =
            self.lifecycle
                .store()
                .complete_milestone_claim(storyteller, milestone, counts.persisted)
        {
            warn!(storyteller = %storyteller, milestone, error = %e, "Failed to mark milestone claim completed");
        }
        info!(
            storyteller = %storyteller,
            milestone,
            tier = %Tier::Milestone,
            produced = counts.produced,
            persisted = counts.persisted,
            duplicates = counts.duplicates,
            rejected = counts.rejected,
            insights,
            "Milestone analysis complete"
        );
        MilestoneOutcome::Completed {
            milestone,
            counts,
            insights,
        }
    }

    async fn call_provider(
        &self,
        analyzer: &dyn StoryAnalyzer,
        stories: &[Story],
        milestone: u32,
    ) -> Result<AnalysisResponse, ProviderError> {
        match tokio::time::timeout(self.timeout, analyzer.analyze(stories, milestone)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        }
    }

    fn release(&self, storyteller: &StorytellerId, milestone: u32) {
        if let Err(e) = self.lifecycle.store().release_milestone_claim(storyteller, milestone) {
            warn!(storyteller = %storyteller, milestone, error = %e, "Failed to release milestone claim");
        }
    }

    fn persist_prompts(
        &self,
        storyteller: &StorytellerId,
        milestone: u32,
        response: &AnalysisResponse,
    ) -> TierCounts {
        let mut counts = TierCounts::default();
        for meta in &response.prompts {
            let Some(candidate) = self.to_candidate(storyteller, milestone, meta) else {
                warn!(storyteller = %storyteller, milestone, text = %meta.text, "Rejected Tier 3 candidate");
                counts.rejected += 1;
                continue;
            };
            counts.produced += 1;
            match self.lifecycle.insert_candidate(&candidate) {
                Ok(InsertOutcome::Inserted(_)) => counts.persisted += 1,
                Ok(InsertOutcome::Duplicate(_)) => counts.duplicates += 1,
                Err(e) => log_insert_failure(storyteller, milestone, &e),
            }
        }
        counts
    }

    fn to_candidate(
        &self,
        storyteller: &StorytellerId,
        milestone: u32,
        meta: &CandidateMeta,
    ) -> Option<PromptCandidate> {
        if !quality::validate(&meta.text) {
            return None;
        }
        let memory_type = meta.memory_type.unwrap_or(MemoryType::Event);
        let scope = format!("milestone:{}:{}", storyteller, milestone);
        let anchor = meta.anchor.as_deref().unwrap_or(&meta.text);
        Some(PromptCandidate {
            storyteller_id: storyteller.clone(),
            story_id: None,
            text: meta.text.clone(),
            tier: Tier::Milestone,
            context_note: meta.reasoning.clone(),
            anchor_entity: meta.anchor.clone(),
            anchor_year: meta.year,
            anchor_hash: anchor_hash(&scope, anchor, memory_type),
            memory_type,
            score: quality::score(&meta.text),
            expires_at: now() + self.expiry,
        })
    }

    /// Independent of the prompt writes; a failure here keeps the prompts.
    fn persist_insights(
        &self,
        storyteller: &StorytellerId,
        milestone: u32,
        response: &AnalysisResponse,
    ) -> usize {
        if response.insights.is_empty() {
            return 0;
        }
        let store = self.lifecycle.store();
        let mut records = Vec::with_capacity(response.insights.len());
        for insight in &response.insights {
            let id = match store.generate_id() {
                Ok(id) => id,
                Err(e) => {
                    warn!(storyteller = %storyteller, milestone, error = %e, "Failed to persist insights");
                    return 0;
                }
            };
            records.push(InsightRecord {
                id,
                storyteller_id: storyteller.clone(),
                milestone,
                insight_type: insight.insight_type.clone(),
                content: insight.content.clone(),
                confidence: insight.confidence,
                created_at: now(),
            });
        }
        match store.put_insights(&records) {
            Ok(()) => records.len(),
            Err(e) => {
                warn!(storyteller = %storyteller, milestone, error = %e, "Failed to persist insights");
                0
            }
        }
    }
}

fn log_insert_failure(storyteller: &StorytellerId, milestone: u32, err: &EngineError) {
    warn!(storyteller = %storyteller, milestone, error = %err, "Failed to persist Tier 3 prompt");
}
