//! Lifecycle Store
//!
//! State transitions for AI-sourced and catalog-sourced prompts. Every
//! multi-record change runs as one sled transaction: a status change and its
//! queue position, a unique-key index and its record, a history write and the
//! removal of the live record. Nothing is left half-applied.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError};
use sled::{Transactional, Tree};
use tracing::{debug, info};

use crate::error::{EngineError, StorageError};
use crate::generation::anchor::normalize_anchor;
use crate::generation::PromptCandidate;
use crate::quality;
use crate::store::persistence::{
    bump_position, decode, decode_id, encode, encode_id, prompt_key, scoped_key,
    TREE_AI_PROMPTS, TREE_CATALOG_PROMPTS,
};
use crate::store::{AiPrompt, CatalogPrompt, HistoryOutcome, HistoryRecord, InsertOutcome, PromptStore};
use crate::types::{now, PromptId, PromptSource, PromptStatus, StorytellerId, Tier, Timestamp};

/// Skips that retire a prompt
pub const SKIP_RETIREMENT_THRESHOLD: u32 = 3;

/// A persisted prompt from either partition behind one read interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PromptRecord {
    Ai(AiPrompt),
    Catalog(CatalogPrompt),
}

/// Tier for generated prompts, category for catalog prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptLabel<'a> {
    Tier(Tier),
    Category(Option<&'a str>),
}

impl PromptRecord {
    pub fn id(&self) -> PromptId {
        match self {
            PromptRecord::Ai(p) => p.id,
            PromptRecord::Catalog(p) => p.id,
        }
    }

    pub fn source(&self) -> PromptSource {
        match self {
            PromptRecord::Ai(_) => PromptSource::Ai,
            PromptRecord::Catalog(_) => PromptSource::Catalog,
        }
    }

    pub fn storyteller_id(&self) -> &StorytellerId {
        match self {
            PromptRecord::Ai(p) => &p.storyteller_id,
            PromptRecord::Catalog(p) => &p.storyteller_id,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            PromptRecord::Ai(p) => &p.prompt_text,
            PromptRecord::Catalog(p) => &p.prompt_text,
        }
    }

    pub fn status(&self) -> PromptStatus {
        match self {
            PromptRecord::Ai(p) => p.status,
            PromptRecord::Catalog(p) => p.status,
        }
    }

    pub fn label(&self) -> PromptLabel<'_> {
        match self {
            PromptRecord::Ai(p) => PromptLabel::Tier(p.tier),
            PromptRecord::Catalog(p) => PromptLabel::Category(p.category.as_deref()),
        }
    }

    pub fn skip_count(&self) -> u32 {
        match self {
            PromptRecord::Ai(p) => p.skip_count,
            PromptRecord::Catalog(p) => p.skip_count,
        }
    }

    pub fn queue_position(&self) -> Option<u64> {
        match self {
            PromptRecord::Ai(p) => p.queue_position,
            PromptRecord::Catalog(p) => p.queue_position,
        }
    }

    pub fn created_at(&self) -> Timestamp {
        match self {
            PromptRecord::Ai(p) => p.created_at,
            PromptRecord::Catalog(p) => p.created_at,
        }
    }

    pub fn dismissed_at(&self) -> Option<Timestamp> {
        match self {
            PromptRecord::Ai(p) => p.dismissed_at,
            PromptRecord::Catalog(p) => p.dismissed_at,
        }
    }

    /// Ranking score; catalog prompts carry no generated score and rank at `catalog_score`
    pub fn rank_score(&self, catalog_score: u32) -> u32 {
        match self {
            PromptRecord::Ai(p) => p.score,
            PromptRecord::Catalog(_) => catalog_score,
        }
    }

    /// ACTIVE and unexpired, or QUEUED. Queued prompts never expire.
    pub fn is_selectable(&self, at: Timestamp) -> bool {
        match self.status() {
            PromptStatus::Queued => true,
            PromptStatus::Dismissed => false,
            PromptStatus::Active => match self {
                PromptRecord::Ai(p) => p.expires_at.map_or(true, |expiry| expiry > at),
                PromptRecord::Catalog(_) => true,
            },
        }
    }
}

/// Result of `transition`
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Changed(PromptRecord),
    /// The record was already in the requested state; nothing was written
    Unchanged(PromptRecord),
}

impl TransitionOutcome {
    pub fn record(&self) -> &PromptRecord {
        match self {
            TransitionOutcome::Changed(r) | TransitionOutcome::Unchanged(r) => r,
        }
    }

    pub fn into_record(self) -> PromptRecord {
        match self {
            TransitionOutcome::Changed(r) | TransitionOutcome::Unchanged(r) => r,
        }
    }
}

/// Result of `record_skip`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "record", rename_all = "snake_case")]
pub enum SkipOutcome {
    /// Counter incremented below the retirement threshold
    Counted(PromptRecord),
    /// Third skip: the record moved to history
    Retired(HistoryRecord),
}

enum TxFail {
    NotFound,
    Rejected(String),
    Storage(StorageError),
}

fn abort<T>(fail: TxFail) -> ConflictableTransactionResult<T, TxFail> {
    Err(ConflictableTransactionError::Abort(fail))
}

fn abort_storage(err: StorageError) -> ConflictableTransactionError<TxFail> {
    ConflictableTransactionError::Abort(TxFail::Storage(err))
}

/// Shared mutation surface of the two prompt shapes
trait LifecycleRecord: Serialize + DeserializeOwned + Clone {
    const TREE: &'static str;
    const SOURCE: PromptSource;

    fn status(&self) -> PromptStatus;
    fn apply(&mut self, to: PromptStatus, position: Option<u64>, at: Timestamp);
    fn count_skip(&mut self, at: Timestamp) -> u32;
    fn to_history(&self, id: u64, outcome: HistoryOutcome, at: Timestamp) -> HistoryRecord;
    /// Unique-index entry released when the record leaves the store
    fn released_index_key(&self) -> Option<Vec<u8>>;
    fn into_record(self) -> PromptRecord;
}

impl LifecycleRecord for AiPrompt {
    const TREE: &'static str = TREE_AI_PROMPTS;
    const SOURCE: PromptSource = PromptSource::Ai;

    fn status(&self) -> PromptStatus {
        self.status
    }

    fn apply(&mut self, to: PromptStatus, position: Option<u64>, at: Timestamp) {
        self.status = to;
        self.queue_position = position;
        match to {
            PromptStatus::Queued => self.queued_at = Some(at),
            PromptStatus::Dismissed => self.dismissed_at = Some(at),
            PromptStatus::Active => {}
        }
    }

    fn count_skip(&mut self, at: Timestamp) -> u32 {
        self.skip_count += 1;
        self.last_shown_at = Some(at);
        self.skip_count
    }

    fn to_history(&self, id: u64, outcome: HistoryOutcome, at: Timestamp) -> HistoryRecord {
        HistoryRecord {
            id,
            storyteller_id: self.storyteller_id.clone(),
            source: PromptSource::Ai,
            original_prompt_id: self.id,
            prompt_text: self.prompt_text.clone(),
            tier: Some(self.tier),
            category: None,
            score: Some(self.score),
            outcome,
            skip_count: self.skip_count,
            archived_at: at,
        }
    }

    // The anchor index outlives the record so regeneration stays deduplicated.
    fn released_index_key(&self) -> Option<Vec<u8>> {
        None
    }

    fn into_record(self) -> PromptRecord {
        PromptRecord::Ai(self)
    }
}

impl LifecycleRecord for CatalogPrompt {
    const TREE: &'static str = TREE_CATALOG_PROMPTS;
    const SOURCE: PromptSource = PromptSource::Catalog;

    fn status(&self) -> PromptStatus {
        self.status
    }

    fn apply(&mut self, to: PromptStatus, position: Option<u64>, at: Timestamp) {
        self.status = to;
        self.queue_position = position;
        match to {
            PromptStatus::Queued => self.queued_at = Some(at),
            PromptStatus::Dismissed => self.dismissed_at = Some(at),
            PromptStatus::Active => {}
        }
    }

    fn count_skip(&mut self, _at: Timestamp) -> u32 {
        self.skip_count += 1;
        self.skip_count
    }

    fn to_history(&self, id: u64, outcome: HistoryOutcome, at: Timestamp) -> HistoryRecord {
        HistoryRecord {
            id,
            storyteller_id: self.storyteller_id.clone(),
            source: PromptSource::Catalog,
            original_prompt_id: self.id,
            prompt_text: self.prompt_text.clone(),
            tier: None,
            category: self.category.clone(),
            score: None,
            outcome,
            skip_count: self.skip_count,
            archived_at: at,
        }
    }

    fn released_index_key(&self) -> Option<Vec<u8>> {
        Some(scoped_key(
            &self.storyteller_id,
            catalog_text_key(&self.prompt_text).as_bytes(),
        ))
    }

    fn into_record(self) -> PromptRecord {
        PromptRecord::Catalog(self)
    }
}

/// Uniqueness key for catalog prompts: NFC, lowercased, whitespace collapsed
pub fn catalog_text_key(text: &str) -> String {
    normalize_anchor(text)
}

/// Persistence operations over the prompt partitions
#[derive(Clone)]
pub struct LifecycleStore {
    store: PromptStore,
}

impl LifecycleStore {
    pub fn new(store: PromptStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PromptStore {
        &self.store
    }

    /// Persist a gated candidate as an ACTIVE AI prompt.
    ///
    /// A candidate whose anchor hash already exists for the storyteller is a
    /// successful no-op reported as [`InsertOutcome::Duplicate`].
    pub fn insert_candidate(
        &self,
        candidate: &PromptCandidate,
    ) -> Result<InsertOutcome<AiPrompt>, EngineError> {
        if !quality::validate(&candidate.text) {
            return Err(EngineError::Validation(format!(
                "candidate failed the quality gate: {}",
                candidate.text
            )));
        }

        let storyteller = &candidate.storyteller_id;
        if let Some(existing) = self.store.find_ai_by_anchor(storyteller, &candidate.anchor_hash)? {
            debug!(storyteller = %storyteller, anchor_hash = %candidate.anchor_hash, "Duplicate candidate");
            return Ok(InsertOutcome::Duplicate(existing));
        }

        let id = PromptId(self.store.generate_id()?);
        let prompt = AiPrompt {
            id,
            storyteller_id: storyteller.clone(),
            story_id: candidate.story_id.clone(),
            tier: candidate.tier,
            prompt_text: candidate.text.clone(),
            context_note: candidate.context_note.clone(),
            anchor_entity: candidate.anchor_entity.clone(),
            anchor_year: candidate.anchor_year,
            anchor_hash: candidate.anchor_hash.clone(),
            memory_type: candidate.memory_type,
            score: candidate.score,
            status: PromptStatus::Active,
            skip_count: 0,
            shown_count: 0,
            queue_position: None,
            created_at: now(),
            queued_at: None,
            dismissed_at: None,
            last_shown_at: None,
            expires_at: Some(candidate.expires_at),
        };
        let encoded = encode(&prompt)?;
        let record_key = prompt_key(storyteller, id);
        let anchor_key = scoped_key(storyteller, candidate.anchor_hash.as_bytes());

        let outcome = (self.store.ai_prompts(), self.store.ai_anchors())
            .transaction(|(prompts, anchors)| -> ConflictableTransactionResult<_, TxFail> {
                // Concurrent generators race here; the index insert decides.
                if let Some(raw) = anchors.get(&anchor_key)? {
                    return Ok(InsertOutcome::Duplicate(decode_id(&raw)));
                }
                anchors.insert(anchor_key.as_slice(), encode_id(id).to_vec())?;
                prompts.insert(record_key.as_slice(), encoded.as_slice())?;
                Ok(InsertOutcome::Inserted(prompt.clone()))
            })
            .map_err(|e| tx_error(e, PromptSource::Ai, id))?;

        match &outcome {
            InsertOutcome::Inserted(p) => {
                debug!(storyteller = %storyteller, prompt_id = %p.id, tier = %p.tier, "Persisted candidate")
            }
            InsertOutcome::Duplicate(existing) => {
                debug!(storyteller = %storyteller, prompt_id = %existing, anchor_hash = %candidate.anchor_hash, "Duplicate candidate")
            }
        }
        Ok(outcome)
    }

    /// Store a catalog prompt the storyteller acted on, directly in `status`.
    /// An existing record with the same normalised text is a duplicate.
    pub fn insert_catalog(
        &self,
        storyteller: &StorytellerId,
        text: &str,
        category: Option<&str>,
        status: PromptStatus,
    ) -> Result<InsertOutcome<CatalogPrompt>, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::Validation("catalog prompt text is empty".to_string()));
        }
        if status == PromptStatus::Active {
            return Err(EngineError::Validation(
                "catalog prompts are stored as queued or dismissed".to_string(),
            ));
        }

        let id = PromptId(self.store.generate_id()?);
        let created_at = now();
        let record_key = prompt_key(storyteller, id);
        let text_key = scoped_key(storyteller, catalog_text_key(text).as_bytes());

        let outcome = (
            self.store.catalog_prompts(),
            self.store.catalog_text(),
            self.store.positions(),
        )
            .transaction(|(prompts, index, positions)| -> ConflictableTransactionResult<_, TxFail> {
                if let Some(raw) = index.get(&text_key)? {
                    return Ok(InsertOutcome::Duplicate(decode_id(&raw)));
                }
                let position = match status {
                    PromptStatus::Queued => Some(bump_position(positions, storyteller)?),
                    _ => None,
                };
                let mut prompt = CatalogPrompt {
                    id,
                    storyteller_id: storyteller.clone(),
                    prompt_text: text.to_string(),
                    category: category.map(str::to_string),
                    status,
                    skip_count: 0,
                    queue_position: None,
                    created_at,
                    queued_at: None,
                    dismissed_at: None,
                };
                prompt.apply(status, position, created_at);
                index.insert(text_key.as_slice(), encode_id(id).to_vec())?;
                prompts.insert(record_key.as_slice(), encode(&prompt).map_err(abort_storage)?)?;
                Ok(InsertOutcome::Inserted(prompt))
            })
            .map_err(|e| tx_error(e, PromptSource::Catalog, id))?;

        if let InsertOutcome::Inserted(p) = &outcome {
            info!(storyteller = %storyteller, prompt_id = %p.id, status = %p.status, "Stored catalog prompt");
        }
        Ok(outcome)
    }

    pub fn get(
        &self,
        storyteller: &StorytellerId,
        id: PromptId,
        source: PromptSource,
    ) -> Result<Option<PromptRecord>, EngineError> {
        Ok(match source {
            PromptSource::Ai => self.store.get_ai_prompt(storyteller, id)?.map(PromptRecord::Ai),
            PromptSource::Catalog => self
                .store
                .get_catalog_prompt(storyteller, id)?
                .map(PromptRecord::Catalog),
        })
    }

    pub fn find_catalog_by_text(
        &self,
        storyteller: &StorytellerId,
        text: &str,
    ) -> Result<Option<CatalogPrompt>, EngineError> {
        Ok(self
            .store
            .find_catalog_by_text_key(storyteller, &catalog_text_key(text))?)
    }

    /// Every live record for a storyteller across both partitions
    pub fn list(&self, storyteller: &StorytellerId) -> Result<Vec<PromptRecord>, EngineError> {
        let mut records: Vec<PromptRecord> = self
            .store
            .list_ai_prompts(storyteller)?
            .into_iter()
            .map(PromptRecord::Ai)
            .collect();
        records.extend(
            self.store
                .list_catalog_prompts(storyteller)?
                .into_iter()
                .map(PromptRecord::Catalog),
        );
        Ok(records)
    }

    /// DISMISSED records across both sources, most recently dismissed first
    pub fn list_archive(&self, storyteller: &StorytellerId) -> Result<Vec<PromptRecord>, EngineError> {
        let mut archive: Vec<PromptRecord> = self
            .list(storyteller)?
            .into_iter()
            .filter(|r| r.status() == PromptStatus::Dismissed)
            .collect();
        archive.sort_by(|a, b| {
            b.dismissed_at()
                .cmp(&a.dismissed_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(archive)
    }

    /// Move a record to QUEUED or DISMISSED.
    ///
    /// Entering QUEUED allocates a position in the same transaction; leaving it
    /// clears the position. Requesting the current state writes nothing.
    pub fn transition(
        &self,
        storyteller: &StorytellerId,
        id: PromptId,
        source: PromptSource,
        to: PromptStatus,
    ) -> Result<TransitionOutcome, EngineError> {
        if to == PromptStatus::Active {
            return Err(EngineError::Validation(
                "prompts cannot be moved back to active".to_string(),
            ));
        }
        let outcome = match source {
            PromptSource::Ai => self.transition_in::<AiPrompt>(self.store.ai_prompts(), storyteller, id, to)?,
            PromptSource::Catalog => {
                self.transition_in::<CatalogPrompt>(self.store.catalog_prompts(), storyteller, id, to)?
            }
        };
        if let TransitionOutcome::Changed(record) = &outcome {
            info!(
                storyteller = %storyteller,
                prompt_id = %id,
                source = %source,
                status = %record.status(),
                position = ?record.queue_position(),
                "Prompt transitioned"
            );
        }
        Ok(outcome)
    }

    fn transition_in<T: LifecycleRecord>(
        &self,
        prompts: &Tree,
        storyteller: &StorytellerId,
        id: PromptId,
        to: PromptStatus,
    ) -> Result<TransitionOutcome, EngineError> {
        let key = prompt_key(storyteller, id);
        (prompts, self.store.positions())
            .transaction(|(prompts, positions)| {
                let Some(raw) = prompts.get(&key)? else {
                    return abort(TxFail::NotFound);
                };
                let mut record: T = decode(T::TREE, &raw).map_err(abort_storage)?;
                if record.status() == to {
                    return Ok(TransitionOutcome::Unchanged(record.into_record()));
                }
                let position = match to {
                    PromptStatus::Queued => Some(bump_position(positions, storyteller)?),
                    _ => None,
                };
                record.apply(to, position, now());
                prompts.insert(key.as_slice(), encode(&record).map_err(abort_storage)?)?;
                Ok(TransitionOutcome::Changed(record.into_record()))
            })
            .map_err(|e| tx_error(e, T::SOURCE, id))
    }

    /// Increment the skip counter; the third skip retires the record into history.
    pub fn record_skip(
        &self,
        storyteller: &StorytellerId,
        id: PromptId,
        source: PromptSource,
    ) -> Result<SkipOutcome, EngineError> {
        let history_id = self.store.generate_id()?;
        let outcome = match source {
            PromptSource::Ai => self.skip_in::<AiPrompt>(self.store.ai_prompts(), storyteller, id, history_id)?,
            PromptSource::Catalog => {
                self.skip_in::<CatalogPrompt>(self.store.catalog_prompts(), storyteller, id, history_id)?
            }
        };
        match &outcome {
            SkipOutcome::Counted(record) => info!(
                storyteller = %storyteller,
                prompt_id = %id,
                source = %source,
                skip_count = record.skip_count(),
                "Prompt skipped"
            ),
            SkipOutcome::Retired(history) => info!(
                storyteller = %storyteller,
                prompt_id = %id,
                source = %source,
                skip_count = history.skip_count,
                "Prompt retired to history"
            ),
        }
        Ok(outcome)
    }

    fn skip_in<T: LifecycleRecord>(
        &self,
        prompts: &Tree,
        storyteller: &StorytellerId,
        id: PromptId,
        history_id: u64,
    ) -> Result<SkipOutcome, EngineError> {
        let key = prompt_key(storyteller, id);
        let history_key = scoped_key(storyteller, &history_id.to_be_bytes());
        (prompts, self.store.history(), self.index_tree(T::SOURCE))
            .transaction(|(prompts, history, index)| {
                let Some(raw) = prompts.get(&key)? else {
                    return abort(TxFail::NotFound);
                };
                let mut record: T = decode(T::TREE, &raw).map_err(abort_storage)?;
                if record.status() == PromptStatus::Dismissed {
                    return abort(TxFail::Rejected(format!(
                        "{} prompt {} is dismissed and cannot be skipped",
                        T::SOURCE,
                        id
                    )));
                }
                let at = now();
                if record.count_skip(at) >= SKIP_RETIREMENT_THRESHOLD {
                    let entry = record.to_history(history_id, HistoryOutcome::Skipped, at);
                    history.insert(history_key.as_slice(), encode(&entry).map_err(abort_storage)?)?;
                    prompts.remove(key.as_slice())?;
                    if let Some(index_key) = record.released_index_key() {
                        index.remove(index_key)?;
                    }
                    return Ok(SkipOutcome::Retired(entry));
                }
                prompts.insert(key.as_slice(), encode(&record).map_err(abort_storage)?)?;
                Ok(SkipOutcome::Counted(record.into_record()))
            })
            .map_err(|e| tx_error(e, T::SOURCE, id))
    }

    /// Write a history record and remove the live record in one transaction.
    pub fn archive_to_history(
        &self,
        storyteller: &StorytellerId,
        id: PromptId,
        source: PromptSource,
        outcome: HistoryOutcome,
    ) -> Result<HistoryRecord, EngineError> {
        let history_id = self.store.generate_id()?;
        let entry = match source {
            PromptSource::Ai => {
                self.archive_in::<AiPrompt>(self.store.ai_prompts(), storyteller, id, history_id, outcome)?
            }
            PromptSource::Catalog => self.archive_in::<CatalogPrompt>(
                self.store.catalog_prompts(),
                storyteller,
                id,
                history_id,
                outcome,
            )?,
        };
        info!(storyteller = %storyteller, prompt_id = %id, source = %source, outcome = %outcome, "Prompt archived to history");
        Ok(entry)
    }

    fn archive_in<T: LifecycleRecord>(
        &self,
        prompts: &Tree,
        storyteller: &StorytellerId,
        id: PromptId,
        history_id: u64,
        outcome: HistoryOutcome,
    ) -> Result<HistoryRecord, EngineError> {
        let key = prompt_key(storyteller, id);
        let history_key = scoped_key(storyteller, &history_id.to_be_bytes());
        (prompts, self.store.history(), self.index_tree(T::SOURCE))
            .transaction(|(prompts, history, index)| {
                let Some(raw) = prompts.remove(key.as_slice())? else {
                    return abort(TxFail::NotFound);
                };
                let record: T = decode(T::TREE, &raw).map_err(abort_storage)?;
                let entry = record.to_history(history_id, outcome, now());
                history.insert(history_key.as_slice(), encode(&entry).map_err(abort_storage)?)?;
                if let Some(index_key) = record.released_index_key() {
                    index.remove(index_key)?;
                }
                Ok(entry)
            })
            .map_err(|e| tx_error(e, T::SOURCE, id))
    }

    /// Hard removal without a history record
    pub fn delete(
        &self,
        storyteller: &StorytellerId,
        id: PromptId,
        source: PromptSource,
    ) -> Result<PromptRecord, EngineError> {
        let removed = match source {
            PromptSource::Ai => self.delete_in::<AiPrompt>(self.store.ai_prompts(), storyteller, id)?,
            PromptSource::Catalog => {
                self.delete_in::<CatalogPrompt>(self.store.catalog_prompts(), storyteller, id)?
            }
        };
        info!(storyteller = %storyteller, prompt_id = %id, source = %source, "Prompt deleted");
        Ok(removed)
    }

    fn delete_in<T: LifecycleRecord>(
        &self,
        prompts: &Tree,
        storyteller: &StorytellerId,
        id: PromptId,
    ) -> Result<PromptRecord, EngineError> {
        let key = prompt_key(storyteller, id);
        (prompts, self.index_tree(T::SOURCE))
            .transaction(|(prompts, index)| {
                let Some(raw) = prompts.remove(key.as_slice())? else {
                    return abort(TxFail::NotFound);
                };
                let record: T = decode(T::TREE, &raw).map_err(abort_storage)?;
                if let Some(index_key) = record.released_index_key() {
                    index.remove(index_key)?;
                }
                Ok(record.into_record())
            })
            .map_err(|e| tx_error(e, T::SOURCE, id))
    }

    /// Record that an AI prompt was displayed
    pub fn mark_shown(&self, storyteller: &StorytellerId, id: PromptId) -> Result<(), EngineError> {
        let key = prompt_key(storyteller, id);
        self.store
            .ai_prompts()
            .transaction(|prompts| {
                let Some(raw) = prompts.get(&key)? else {
                    return abort(TxFail::NotFound);
                };
                let mut prompt: AiPrompt = decode(TREE_AI_PROMPTS, &raw).map_err(abort_storage)?;
                prompt.shown_count += 1;
                prompt.last_shown_at = Some(now());
                prompts.insert(key.as_slice(), encode(&prompt).map_err(abort_storage)?)?;
                Ok(())
            })
            .map_err(|e| tx_error(e, PromptSource::Ai, id))
    }

    fn index_tree(&self, source: PromptSource) -> &Tree {
        match source {
            PromptSource::Ai => self.store.ai_anchors(),
            PromptSource::Catalog => self.store.catalog_text(),
        }
    }
}

fn tx_error(err: TransactionError<TxFail>, source: PromptSource, id: PromptId) -> EngineError {
    match err {
        TransactionError::Abort(TxFail::NotFound) => EngineError::prompt_not_found(source, id),
        TransactionError::Abort(TxFail::Rejected(message)) => EngineError::Validation(message),
        TransactionError::Abort(TxFail::Storage(e)) => EngineError::Persistence(e),
        TransactionError::Storage(e) => EngineError::Persistence(e.into()),
    }
}
