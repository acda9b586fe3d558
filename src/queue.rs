//! Queue coordination: positions, queue/dismiss/skip policy and next-prompt resolution.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::lifecycle::{LifecycleStore, PromptRecord, SkipOutcome, TransitionOutcome};
use crate::store::InsertOutcome;
use crate::types::{now, PromptId, PromptSource, PromptStatus, StorytellerId};

/// Score assigned to catalog prompts when ranking against generated ones
pub const DEFAULT_CATALOG_SCORE: u32 = 50;

/// How a caller names a prompt. Catalog prompts may be named by their text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptRef {
    Id(PromptId),
    Text(String),
}

impl From<PromptId> for PromptRef {
    fn from(id: PromptId) -> Self {
        PromptRef::Id(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "prompt", rename_all = "snake_case")]
pub enum QueueOutcome {
    Queued(PromptRecord),
    AlreadyQueued(PromptRecord),
}

impl QueueOutcome {
    pub fn record(&self) -> &PromptRecord {
        match self {
            QueueOutcome::Queued(r) | QueueOutcome::AlreadyQueued(r) => r,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            QueueOutcome::Queued(_) => "queued",
            QueueOutcome::AlreadyQueued(_) => "already queued",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "prompt", rename_all = "snake_case")]
pub enum DismissOutcome {
    Dismissed(PromptRecord),
    AlreadyArchived(PromptRecord),
}

impl DismissOutcome {
    pub fn record(&self) -> &PromptRecord {
        match self {
            DismissOutcome::Dismissed(r) | DismissOutcome::AlreadyArchived(r) => r,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DismissOutcome::Dismissed(_) => "dismissed",
            DismissOutcome::AlreadyArchived(_) => "already archived",
        }
    }
}

/// An action outcome plus the prompt to show next (best-effort)
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub outcome: T,
    pub next: Option<PromptRecord>,
}

#[derive(Clone)]
pub struct QueueCoordinator {
    lifecycle: LifecycleStore,
    catalog_score: u32,
}

impl QueueCoordinator {
    pub fn new(lifecycle: LifecycleStore, catalog_score: u32) -> Self {
        Self {
            lifecycle,
            catalog_score,
        }
    }

    pub fn lifecycle(&self) -> &LifecycleStore {
        &self.lifecycle
    }

    /// One more than the highest position handed out for the storyteller, atomically.
    pub fn next_queue_position(&self, storyteller: &StorytellerId) -> Result<u64, EngineError> {
        Ok(self.lifecycle.store().next_queue_position(storyteller)?)
    }

    /// Queue a prompt. Already-queued prompts keep their position.
    ///
    /// A catalog prompt named by text that has no record is stored directly as QUEUED.
    pub fn queue(
        &self,
        storyteller: &StorytellerId,
        prompt: &PromptRef,
        source: PromptSource,
        category: Option<&str>,
    ) -> Result<QueueOutcome, EngineError> {
        let id = match self.resolve(storyteller, prompt, source)? {
            Some(id) => id,
            None => {
                let text = ref_text(prompt)?;
                return match self
                    .lifecycle
                    .insert_catalog(storyteller, text, category, PromptStatus::Queued)?
                {
                    InsertOutcome::Inserted(p) => Ok(QueueOutcome::Queued(PromptRecord::Catalog(p))),
                    // Lost a race with a concurrent insert of the same text.
                    InsertOutcome::Duplicate(id) => self.queue(storyteller, &PromptRef::Id(id), source, category),
                };
            }
        };
        Ok(
            match self
                .lifecycle
                .transition(storyteller, id, source, PromptStatus::Queued)?
            {
                TransitionOutcome::Changed(record) => QueueOutcome::Queued(record),
                TransitionOutcome::Unchanged(record) => {
                    debug!(storyteller = %storyteller, prompt_id = %id, source = %source, "Prompt already queued");
                    QueueOutcome::AlreadyQueued(record)
                }
            },
        )
    }

    /// Dismiss a prompt, clearing any position. Unknown catalog text is stored as DISMISSED.
    pub fn dismiss(
        &self,
        storyteller: &StorytellerId,
        prompt: &PromptRef,
        source: PromptSource,
        category: Option<&str>,
    ) -> Result<Resolved<DismissOutcome>, EngineError> {
        let outcome = match self.resolve(storyteller, prompt, source)? {
            Some(id) => match self
                .lifecycle
                .transition(storyteller, id, source, PromptStatus::Dismissed)?
            {
                TransitionOutcome::Changed(record) => DismissOutcome::Dismissed(record),
                TransitionOutcome::Unchanged(record) => {
                    debug!(storyteller = %storyteller, prompt_id = %id, source = %source, "Prompt already archived");
                    DismissOutcome::AlreadyArchived(record)
                }
            },
            None => {
                let text = ref_text(prompt)?;
                match self
                    .lifecycle
                    .insert_catalog(storyteller, text, category, PromptStatus::Dismissed)?
                {
                    InsertOutcome::Inserted(p) => DismissOutcome::Dismissed(PromptRecord::Catalog(p)),
                    InsertOutcome::Duplicate(id) => {
                        return self.dismiss(storyteller, &PromptRef::Id(id), source, category)
                    }
                }
            }
        };
        let next = self.next_best_effort(storyteller, None);
        Ok(Resolved { outcome, next })
    }

    /// Count a skip (retiring on the third) and resolve the next prompt, excluding
    /// the one just skipped.
    pub fn skip(
        &self,
        storyteller: &StorytellerId,
        id: PromptId,
        source: PromptSource,
    ) -> Result<Resolved<SkipOutcome>, EngineError> {
        let outcome = self.lifecycle.record_skip(storyteller, id, source)?;
        let next = self.next_best_effort(storyteller, Some((source, id)));
        Ok(Resolved { outcome, next })
    }

    pub fn delete(
        &self,
        storyteller: &StorytellerId,
        prompt: &PromptRef,
        source: PromptSource,
    ) -> Result<PromptRecord, EngineError> {
        match self.resolve(storyteller, prompt, source)? {
            Some(id) => self.lifecycle.delete(storyteller, id, source),
            None => Err(EngineError::NotFound(format!(
                "{} prompt \"{}\"",
                source,
                ref_text(prompt)?
            ))),
        }
    }

    /// Highest score first, then oldest, then lowest id.
    pub fn select_next(&self, storyteller: &StorytellerId) -> Result<Option<PromptRecord>, EngineError> {
        self.select_excluding(storyteller, None)
    }

    fn select_excluding(
        &self,
        storyteller: &StorytellerId,
        exclude: Option<(PromptSource, PromptId)>,
    ) -> Result<Option<PromptRecord>, EngineError> {
        let at = now();
        let mut candidates: Vec<PromptRecord> = self
            .lifecycle
            .list(storyteller)?
            .into_iter()
            .filter(|r| r.is_selectable(at))
            .filter(|r| exclude != Some((r.source(), r.id())))
            .collect();
        candidates.sort_by(|a, b| {
            b.rank_score(self.catalog_score)
                .cmp(&a.rank_score(self.catalog_score))
                .then_with(|| a.created_at().cmp(&b.created_at()))
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(candidates.into_iter().next())
    }

    /// Resolution failures degrade to "no next prompt"
    fn next_best_effort(
        &self,
        storyteller: &StorytellerId,
        exclude: Option<(PromptSource, PromptId)>,
    ) -> Option<PromptRecord> {
        match self.select_excluding(storyteller, exclude) {
            Ok(next) => next,
            Err(e) => {
                warn!(storyteller = %storyteller, error = %e, "Failed to resolve next prompt");
                None
            }
        }
    }

    /// Resolve a reference to a record id. `None` means a catalog text with no record.
    fn resolve(
        &self,
        storyteller: &StorytellerId,
        prompt: &PromptRef,
        source: PromptSource,
    ) -> Result<Option<PromptId>, EngineError> {
        match (prompt, source) {
            (PromptRef::Id(id), _) => Ok(Some(*id)),
            (PromptRef::Text(text), PromptSource::Catalog) => Ok(self
                .lifecycle
                .find_catalog_by_text(storyteller, text)?
                .map(|p| p.id)),
            (PromptRef::Text(_), PromptSource::Ai) => Err(EngineError::Validation(
                "generated prompts are referenced by id".to_string(),
            )),
        }
    }
}

fn ref_text(prompt: &PromptRef) -> Result<&str, EngineError> {
    match prompt {
        PromptRef::Text(text) => Ok(text),
        PromptRef::Id(id) => Err(EngineError::Validation(format!("prompt {} is not text", id))),
    }
}
