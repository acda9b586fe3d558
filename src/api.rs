//! Prompt Engine API
//!
//! The caller-facing surface: generation, next-prompt resolution, queue actions,
//! archive and history reads, and the family track. Every storyteller-scoped
//! call takes the acting principal and is authorized before anything else runs.

use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::access::{AccessPolicy, DelegationAccess};
use crate::catalog::{Catalog, CatalogEntry};
use crate::config::EngineConfig;
use crate::error::{EngineError, StorageError};
use crate::family::FamilyTrack;
use crate::generation::{MilestoneAnalyzer, MilestoneOutcome, TemplateGenerator, TierCounts};
use crate::lifecycle::{LifecycleStore, PromptRecord, SkipOutcome};
use crate::outbox::{DispatchReport, Notifier, Outbox, OutboxEvent, OutboxTask};
use crate::provider::{LlmStoryAnalyzer, StoryAnalyzer};
use crate::queue::{DismissOutcome, PromptRef, QueueCoordinator, QueueOutcome, Resolved};
use crate::store::{FamilyPrompt, FamilyPromptStatus, HistoryRecord, InsertOutcome, InsightRecord, PromptStore};
use crate::story::Story;
use crate::types::{PrincipalId, PromptId, PromptSource, StoryId, StorytellerId, Tier};

/// Which generation tiers a request runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierSelection {
    Template,
    Milestone,
    All,
}

impl TierSelection {
    fn includes(self, tier: Tier) -> bool {
        match self {
            TierSelection::All => true,
            TierSelection::Template => tier == Tier::Template,
            TierSelection::Milestone => tier == Tier::Milestone,
        }
    }
}

impl std::str::FromStr for TierSelection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "tier1" | "template" => Ok(TierSelection::Template),
            "3" | "tier3" | "milestone" => Ok(TierSelection::Milestone),
            "all" => Ok(TierSelection::All),
            other => Err(EngineError::Validation(format!(
                "unknown tier '{}' (expected tier1, tier3 or all)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub storyteller_id: StorytellerId,
    /// Stories to run Tier 1 over. Empty means every story of the storyteller.
    pub story_ids: Vec<StoryId>,
    pub tier: TierSelection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerateReport {
    pub tier1: TierCounts,
    pub tier3: TierCounts,
    /// Present when Tier 3 was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<MilestoneOutcome>,
    /// Stories whose Tier 1 generation failed
    pub failed_stories: usize,
}

impl GenerateReport {
    pub fn persisted(&self) -> usize {
        self.tier1.persisted + self.tier3.persisted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextPrompt {
    pub prompt: Option<PromptRecord>,
    /// Pending family-submitted prompts, shown alongside
    pub family: Vec<FamilyPrompt>,
}

/// Prompt engine service
///
/// Owns one store handle and every component built over it.
pub struct PromptEngine {
    store: PromptStore,
    queue: QueueCoordinator,
    templates: TemplateGenerator,
    milestones: MilestoneAnalyzer,
    family: FamilyTrack,
    outbox: Outbox,
    access: Arc<dyn AccessPolicy>,
    catalog: Catalog,
    concurrency: usize,
}

pub struct PromptEngineBuilder {
    store: PromptStore,
    config: EngineConfig,
    analyzer: Option<Arc<dyn StoryAnalyzer>>,
    access: Option<Arc<dyn AccessPolicy>>,
}

impl PromptEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn StoryAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn access(mut self, access: Arc<dyn AccessPolicy>) -> Self {
        self.access = Some(access);
        self
    }

    pub fn build(self) -> Result<PromptEngine, EngineError> {
        let config = self.config.validated()?;
        let generation = &config.generation;
        let lifecycle = LifecycleStore::new(self.store.clone());
        let access = self
            .access
            .unwrap_or_else(|| Arc::new(DelegationAccess::from_table(&config.access.delegations)));

        Ok(PromptEngine {
            queue: QueueCoordinator::new(lifecycle.clone(), config.queue.catalog_score),
            templates: TemplateGenerator::new(generation.tier1_expiry_days, generation.max_anchors_per_story),
            milestones: MilestoneAnalyzer::new(lifecycle, self.analyzer)
                .with_milestones(generation.milestones.clone())
                .with_timeout(generation.milestone_timeout())
                .with_expiry_days(generation.tier3_expiry_days),
            family: FamilyTrack::new(self.store.clone()),
            outbox: Outbox::new(self.store.clone(), config.outbox.max_attempts),
            access,
            catalog: Catalog::builtin()?,
            concurrency: generation.concurrency,
            store: self.store,
        })
    }
}

impl PromptEngine {
    pub fn builder(store: PromptStore) -> PromptEngineBuilder {
        PromptEngineBuilder {
            store,
            config: EngineConfig::default(),
            analyzer: None,
            access: None,
        }
    }

    /// Open the store under `workspace_root` and wire the configured provider.
    ///
    /// A provider that cannot be constructed disables Tier 3 instead of failing startup.
    pub fn from_config(config: EngineConfig, workspace_root: &Path) -> Result<Self, EngineError> {
        let store = PromptStore::open(config.storage.resolve(workspace_root))?;
        let mut builder = Self::builder(store);
        if let Some(provider) = &config.provider {
            match provider.create_client() {
                Ok(client) => {
                    builder = builder.analyzer(Arc::new(LlmStoryAnalyzer::new(
                        client,
                        provider.completion_options(),
                    )));
                }
                Err(e) => {
                    warn!(provider = provider.provider_type.as_str(), error = %e, "Tier 3 disabled: provider unavailable");
                }
            }
        }
        builder.config(config).build()
    }

    pub fn store(&self) -> &PromptStore {
        &self.store
    }

    pub fn queue_coordinator(&self) -> &QueueCoordinator {
        &self.queue
    }

    pub fn lifecycle(&self) -> &LifecycleStore {
        self.queue.lifecycle()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Validate the storyteller key and authorize the principal for it
    fn scoped(&self, principal: &PrincipalId, storyteller: &StorytellerId) -> Result<(), EngineError> {
        storyteller.check_key_safe()?;
        principal.check_key_safe()?;
        self.access.authorize(principal, storyteller)
    }

    /// Record a story from the story collaborator
    pub fn add_story(&self, principal: &PrincipalId, story: Story) -> Result<Story, EngineError> {
        self.scoped(principal, &story.storyteller_id)?;
        story.id.check_key_safe()?;
        if story.id.as_str().trim().is_empty() {
            return Err(EngineError::Validation("story id cannot be empty".to_string()));
        }
        self.store.put_story(&story)?;
        info!(storyteller = %story.storyteller_id, story = %story.id, private = story.is_private, "Story recorded");
        Ok(story)
    }

    pub fn stories(&self, principal: &PrincipalId, storyteller: &StorytellerId) -> Result<Vec<Story>, EngineError> {
        self.scoped(principal, storyteller)?;
        let mut stories = self.store.list_stories(storyteller)?;
        stories.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(stories)
    }

    /// Run the requested tiers and report counts.
    ///
    /// Tier 1 runs per story with bounded parallelism; a request where every
    /// story fails is surfaced, partial failures are logged and counted. Tier 3
    /// never fails the request.
    pub async fn generate(
        &self,
        principal: &PrincipalId,
        request: GenerateRequest,
    ) -> Result<GenerateReport, EngineError> {
        let storyteller = &request.storyteller_id;
        self.scoped(principal, storyteller)?;

        let mut report = GenerateReport::default();
        if request.tier.includes(Tier::Template) {
            let stories = self.load_stories(storyteller, &request.story_ids)?;
            let (counts, failed) = self.run_template_tier(storyteller, stories).await?;
            report.tier1 = counts;
            report.failed_stories = failed;
        }

        if request.tier.includes(Tier::Milestone) {
            let outcome = self.milestones.run(storyteller).await;
            report.tier3 = outcome.counts();
            report.milestone = Some(outcome);
        }

        info!(
            storyteller = %storyteller,
            tier1_persisted = report.tier1.persisted,
            tier3_persisted = report.tier3.persisted,
            failed_stories = report.failed_stories,
            "Generation complete"
        );
        if report.persisted() > 0 {
            self.outbox.enqueue_after_commit(OutboxEvent::PromptsGenerated {
                storyteller_id: storyteller.clone(),
                persisted: report.persisted(),
            });
        }
        Ok(report)
    }

    fn load_stories(
        &self,
        storyteller: &StorytellerId,
        story_ids: &[StoryId],
    ) -> Result<Vec<Story>, EngineError> {
        if story_ids.is_empty() {
            return Ok(self.store.list_stories(storyteller)?);
        }
        story_ids
            .iter()
            .map(|id| {
                self.store
                    .get_story(storyteller, id)?
                    .ok_or_else(|| EngineError::NotFound(format!("story {}", id)))
            })
            .collect()
    }

    async fn run_template_tier(
        &self,
        storyteller: &StorytellerId,
        stories: Vec<Story>,
    ) -> Result<(TierCounts, usize), EngineError> {
        let attempted = stories.len();
        let results: Vec<(StoryId, Result<TierCounts, EngineError>)> = stream::iter(stories)
            .map(|story| {
                let lifecycle = self.lifecycle().clone();
                let templates = self.templates.clone();
                async move {
                    let story_id = story.id.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        generate_for_story(&lifecycle, &templates, &story)
                    })
                    .await
                    .map_err(|e| {
                        EngineError::Persistence(StorageError::IoError(std::io::Error::new(
                            std::io::ErrorKind::Other,
                            e.to_string(),
                        )))
                    })
                    .and_then(|result| result);
                    (story_id, result)
                }
            })
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        let mut counts = TierCounts::default();
        let mut failures = Vec::new();
        for (story_id, result) in results {
            match result {
                Ok(story_counts) => counts.merge(story_counts),
                Err(e) => {
                    warn!(storyteller = %storyteller, story = %story_id, error = %e, "Tier 1 generation failed for story");
                    failures.push(e);
                }
            }
        }

        let failed = failures.len();
        if attempted > 0 && failed == attempted {
            error!(storyteller = %storyteller, stories = attempted, "Tier 1 generation failed for every story");
            if let Some(last) = failures.pop() {
                return Err(last);
            }
        }
        Ok((counts, failed))
    }

    /// The next prompt to show plus the family side list.
    ///
    /// The chosen AI prompt's shown counters are updated best-effort.
    pub fn get_next(&self, principal: &PrincipalId, storyteller: &StorytellerId) -> Result<NextPrompt, EngineError> {
        self.scoped(principal, storyteller)?;
        let prompt = self.queue.select_next(storyteller)?;
        if let Some(PromptRecord::Ai(ai)) = &prompt {
            if let Err(e) = self.lifecycle().mark_shown(storyteller, ai.id) {
                warn!(storyteller = %storyteller, prompt_id = %ai.id, error = %e, "Failed to record prompt shown");
            }
        }
        let family = self.family.pending(storyteller)?;
        Ok(NextPrompt { prompt, family })
    }

    pub fn queue(
        &self,
        principal: &PrincipalId,
        storyteller: &StorytellerId,
        prompt: &PromptRef,
        source: PromptSource,
        category: Option<&str>,
    ) -> Result<QueueOutcome, EngineError> {
        self.scoped(principal, storyteller)?;
        let category = self.catalog_category(prompt, source, category);
        self.queue.queue(storyteller, prompt, source, category.as_deref())
    }

    pub fn dismiss(
        &self,
        principal: &PrincipalId,
        storyteller: &StorytellerId,
        prompt: &PromptRef,
        source: PromptSource,
        category: Option<&str>,
    ) -> Result<Resolved<DismissOutcome>, EngineError> {
        self.scoped(principal, storyteller)?;
        let category = self.catalog_category(prompt, source, category);
        self.queue.dismiss(storyteller, prompt, source, category.as_deref())
    }

    pub fn skip(
        &self,
        principal: &PrincipalId,
        storyteller: &StorytellerId,
        id: PromptId,
        source: PromptSource,
    ) -> Result<Resolved<SkipOutcome>, EngineError> {
        self.scoped(principal, storyteller)?;
        self.queue.skip(storyteller, id, source)
    }

    pub fn delete(
        &self,
        principal: &PrincipalId,
        storyteller: &StorytellerId,
        prompt: &PromptRef,
        source: PromptSource,
    ) -> Result<PromptRecord, EngineError> {
        self.scoped(principal, storyteller)?;
        self.queue.delete(storyteller, prompt, source)
    }

    /// Every DISMISSED record across both sources, most recently dismissed first
    pub fn list_archive(&self, principal: &PrincipalId, storyteller: &StorytellerId) -> Result<Vec<PromptRecord>, EngineError> {
        self.scoped(principal, storyteller)?;
        self.lifecycle().list_archive(storyteller)
    }

    /// Every live record, for listing
    pub fn list_prompts(&self, principal: &PrincipalId, storyteller: &StorytellerId) -> Result<Vec<PromptRecord>, EngineError> {
        self.scoped(principal, storyteller)?;
        self.lifecycle().list(storyteller)
    }

    /// Retired prompts, newest first
    pub fn history(&self, principal: &PrincipalId, storyteller: &StorytellerId) -> Result<Vec<HistoryRecord>, EngineError> {
        self.scoped(principal, storyteller)?;
        Ok(self.store.list_history(storyteller)?)
    }

    pub fn insights(&self, principal: &PrincipalId, storyteller: &StorytellerId) -> Result<Vec<InsightRecord>, EngineError> {
        self.scoped(principal, storyteller)?;
        Ok(self.store.list_insights(storyteller)?)
    }

    /// Submit a family prompt. The submitting principal must hold access.
    pub fn submit_family_prompt(
        &self,
        principal: &PrincipalId,
        storyteller: &StorytellerId,
        text: &str,
    ) -> Result<FamilyPrompt, EngineError> {
        self.scoped(principal, storyteller)?;
        let prompt = self.family.submit(storyteller, principal, text)?;
        self.outbox.enqueue_after_commit(OutboxEvent::FamilyPromptSubmitted {
            storyteller_id: storyteller.clone(),
            prompt_id: prompt.id,
            submitted_by: principal.clone(),
        });
        Ok(prompt)
    }

    pub fn answer_family_prompt(
        &self,
        principal: &PrincipalId,
        storyteller: &StorytellerId,
        id: PromptId,
        story: Option<StoryId>,
    ) -> Result<FamilyPrompt, EngineError> {
        self.scoped(principal, storyteller)?;
        self.family.answer(storyteller, id, story)
    }

    pub fn archive_family_prompt(
        &self,
        principal: &PrincipalId,
        storyteller: &StorytellerId,
        id: PromptId,
    ) -> Result<FamilyPrompt, EngineError> {
        self.scoped(principal, storyteller)?;
        self.family.archive(storyteller, id)
    }

    pub fn family_prompts(
        &self,
        principal: &PrincipalId,
        storyteller: &StorytellerId,
        status: Option<FamilyPromptStatus>,
    ) -> Result<Vec<FamilyPrompt>, EngineError> {
        self.scoped(principal, storyteller)?;
        self.family.list(storyteller, status)
    }

    pub fn catalog_entries(&self, category: Option<&str>) -> Vec<CatalogEntry> {
        self.catalog.entries(category)
    }

    pub fn outbox_tasks(&self) -> Result<Vec<OutboxTask>, EngineError> {
        Ok(self.outbox.tasks()?)
    }

    pub async fn dispatch_outbox(&self, notifier: &dyn Notifier) -> Result<DispatchReport, EngineError> {
        let report = self.outbox.dispatch(notifier).await?;
        info!(
            delivered = report.delivered,
            retried = report.retried,
            dead_lettered = report.dead_lettered,
            "Outbox dispatched"
        );
        Ok(report)
    }

    /// Category for a catalog prompt named by text: the caller's, else the built-in catalog's
    fn catalog_category(&self, prompt: &PromptRef, source: PromptSource, category: Option<&str>) -> Option<String> {
        if let Some(category) = category {
            return Some(category.to_string());
        }
        match (prompt, source) {
            (PromptRef::Text(text), PromptSource::Catalog) => self.catalog.find(text).map(|e| e.category),
            _ => None,
        }
    }
}

/// Tier 1 for one story: render, gate, persist with anchor-hash dedup
fn generate_for_story(
    lifecycle: &LifecycleStore,
    templates: &TemplateGenerator,
    story: &Story,
) -> Result<TierCounts, EngineError> {
    let output = templates.generate(story);
    let mut counts = TierCounts {
        produced: output.candidates.len(),
        rejected: output.rejected,
        ..TierCounts::default()
    };
    for candidate in &output.candidates {
        match lifecycle.insert_candidate(candidate)? {
            InsertOutcome::Inserted(_) => counts.persisted += 1,
            InsertOutcome::Duplicate(existing) => {
                debug!(
                    storyteller = %candidate.storyteller_id,
                    prompt_id = %existing,
                    anchor_hash = %candidate.anchor_hash,
                    "Duplicate candidate"
                );
                counts.duplicates += 1;
            }
        }
    }
    debug!(
        story = %story.id,
        tier = %Tier::Template,
        produced = counts.produced,
        persisted = counts.persisted,
        duplicates = counts.duplicates,
        rejected = counts.rejected,
        "Story generated"
    );
    Ok(counts)
}
