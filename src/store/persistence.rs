//! Sled-backed prompt store.
//!
//! One sled tree per partition. Multi-record invariants (unique keys, status
//! plus position, move-to-history) are enforced by the lifecycle layer with sled
//! transactions over the trees exposed here.

use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionResult, TransactionError, TransactionalTree};
use sled::{Db, Tree};
use tracing::warn;

use crate::error::StorageError;
use crate::store::{
    AiPrompt, CatalogPrompt, ClaimStatus, FamilyPrompt, HistoryRecord, InsightRecord,
    MilestoneClaim,
};
use crate::story::Story;
use crate::types::{now, PromptId, StoryId, StorytellerId};

pub(crate) const TREE_STORIES: &str = "stories";
pub(crate) const TREE_AI_PROMPTS: &str = "ai_prompts";
pub(crate) const TREE_AI_ANCHORS: &str = "ai_anchor_index";
pub(crate) const TREE_CATALOG_PROMPTS: &str = "catalog_prompts";
pub(crate) const TREE_CATALOG_TEXT: &str = "catalog_text_index";
pub(crate) const TREE_FAMILY_PROMPTS: &str = "family_prompts";
pub(crate) const TREE_HISTORY: &str = "prompt_history";
pub(crate) const TREE_INSIGHTS: &str = "character_insights";
pub(crate) const TREE_POSITIONS: &str = "queue_positions";
pub(crate) const TREE_CLAIMS: &str = "milestone_claims";
pub(crate) const TREE_OUTBOX: &str = "outbox";

/// Handle to every persisted partition. Cheap to clone; clones share the database.
#[derive(Clone)]
pub struct PromptStore {
    db: Db,
    stories: Tree,
    ai_prompts: Tree,
    ai_anchors: Tree,
    catalog_prompts: Tree,
    catalog_text: Tree,
    family_prompts: Tree,
    history: Tree,
    insights: Tree,
    positions: Tree,
    claims: Tree,
    outbox: Tree,
}

impl PromptStore {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        Ok(Self {
            stories: db.open_tree(TREE_STORIES)?,
            ai_prompts: db.open_tree(TREE_AI_PROMPTS)?,
            ai_anchors: db.open_tree(TREE_AI_ANCHORS)?,
            catalog_prompts: db.open_tree(TREE_CATALOG_PROMPTS)?,
            catalog_text: db.open_tree(TREE_CATALOG_TEXT)?,
            family_prompts: db.open_tree(TREE_FAMILY_PROMPTS)?,
            history: db.open_tree(TREE_HISTORY)?,
            insights: db.open_tree(TREE_INSIGHTS)?,
            positions: db.open_tree(TREE_POSITIONS)?,
            claims: db.open_tree(TREE_CLAIMS)?,
            outbox: db.open_tree(TREE_OUTBOX)?,
            db,
        })
    }

    /// Open (or create) a store at the given directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Self::new(db)
    }

    /// In-memory store removed on drop
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::new(db)
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn generate_id(&self) -> Result<u64, StorageError> {
        Ok(self.db.generate_id()?)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    pub(crate) fn ai_prompts(&self) -> &Tree {
        &self.ai_prompts
    }

    pub(crate) fn ai_anchors(&self) -> &Tree {
        &self.ai_anchors
    }

    pub(crate) fn catalog_prompts(&self) -> &Tree {
        &self.catalog_prompts
    }

    pub(crate) fn catalog_text(&self) -> &Tree {
        &self.catalog_text
    }

    pub(crate) fn history(&self) -> &Tree {
        &self.history
    }

    pub(crate) fn positions(&self) -> &Tree {
        &self.positions
    }

    pub(crate) fn outbox(&self) -> &Tree {
        &self.outbox
    }

    // Stories

    pub fn put_story(&self, story: &Story) -> Result<(), StorageError> {
        let key = scoped_key(&story.storyteller_id, story.id.as_str().as_bytes());
        self.stories.insert(key, encode(story)?)?;
        Ok(())
    }

    pub fn get_story(
        &self,
        storyteller: &StorytellerId,
        story_id: &StoryId,
    ) -> Result<Option<Story>, StorageError> {
        get_json(&self.stories, TREE_STORIES, &scoped_key(storyteller, story_id.as_str().as_bytes()))
    }

    pub fn list_stories(&self, storyteller: &StorytellerId) -> Result<Vec<Story>, StorageError> {
        scan_json(&self.stories, TREE_STORIES, storyteller)
    }

    // Prompt partitions

    pub fn get_ai_prompt(
        &self,
        storyteller: &StorytellerId,
        id: PromptId,
    ) -> Result<Option<AiPrompt>, StorageError> {
        get_json(&self.ai_prompts, TREE_AI_PROMPTS, &prompt_key(storyteller, id))
    }

    pub fn list_ai_prompts(&self, storyteller: &StorytellerId) -> Result<Vec<AiPrompt>, StorageError> {
        scan_json(&self.ai_prompts, TREE_AI_PROMPTS, storyteller)
    }

    pub fn find_ai_by_anchor(
        &self,
        storyteller: &StorytellerId,
        anchor_hash: &str,
    ) -> Result<Option<PromptId>, StorageError> {
        let key = scoped_key(storyteller, anchor_hash.as_bytes());
        Ok(self.ai_anchors.get(key)?.map(|raw| decode_id(&raw)))
    }

    pub fn get_catalog_prompt(
        &self,
        storyteller: &StorytellerId,
        id: PromptId,
    ) -> Result<Option<CatalogPrompt>, StorageError> {
        get_json(&self.catalog_prompts, TREE_CATALOG_PROMPTS, &prompt_key(storyteller, id))
    }

    pub fn list_catalog_prompts(
        &self,
        storyteller: &StorytellerId,
    ) -> Result<Vec<CatalogPrompt>, StorageError> {
        scan_json(&self.catalog_prompts, TREE_CATALOG_PROMPTS, storyteller)
    }

    /// Look up a catalog record by its normalised text key
    pub fn find_catalog_by_text_key(
        &self,
        storyteller: &StorytellerId,
        text_key: &str,
    ) -> Result<Option<CatalogPrompt>, StorageError> {
        let key = scoped_key(storyteller, text_key.as_bytes());
        match self.catalog_text.get(key)? {
            Some(raw) => self.get_catalog_prompt(storyteller, decode_id(&raw)),
            None => Ok(None),
        }
    }

    // Family track

    pub fn put_family_prompt(&self, prompt: &FamilyPrompt) -> Result<(), StorageError> {
        let key = prompt_key(&prompt.storyteller_id, prompt.id);
        self.family_prompts.insert(key, encode(prompt)?)?;
        Ok(())
    }

    pub fn get_family_prompt(
        &self,
        storyteller: &StorytellerId,
        id: PromptId,
    ) -> Result<Option<FamilyPrompt>, StorageError> {
        get_json(&self.family_prompts, TREE_FAMILY_PROMPTS, &prompt_key(storyteller, id))
    }

    pub fn list_family_prompts(
        &self,
        storyteller: &StorytellerId,
    ) -> Result<Vec<FamilyPrompt>, StorageError> {
        scan_json(&self.family_prompts, TREE_FAMILY_PROMPTS, storyteller)
    }

    // History

    pub fn list_history(&self, storyteller: &StorytellerId) -> Result<Vec<HistoryRecord>, StorageError> {
        let mut records: Vec<HistoryRecord> = scan_json(&self.history, TREE_HISTORY, storyteller)?;
        records.sort_by(|a, b| b.archived_at.cmp(&a.archived_at).then_with(|| b.id.cmp(&a.id)));
        Ok(records)
    }

    // Insights

    pub fn put_insights(&self, records: &[InsightRecord]) -> Result<(), StorageError> {
        let mut batch = sled::Batch::default();
        for record in records {
            batch.insert(
                scoped_key(&record.storyteller_id, &record.id.to_be_bytes()),
                encode(record)?,
            );
        }
        self.insights.apply_batch(batch)?;
        Ok(())
    }

    pub fn list_insights(&self, storyteller: &StorytellerId) -> Result<Vec<InsightRecord>, StorageError> {
        scan_json(&self.insights, TREE_INSIGHTS, storyteller)
    }

    // Queue positions

    /// Atomically allocate the next queue position for a storyteller (1-based).
    pub fn next_queue_position(&self, storyteller: &StorytellerId) -> Result<u64, StorageError> {
        self.positions
            .transaction(|positions| bump_position::<StorageError>(positions, storyteller))
            .map_err(from_transaction)
    }

    /// Highest position handed out so far (0 if none)
    pub fn current_queue_position(&self, storyteller: &StorytellerId) -> Result<u64, StorageError> {
        Ok(self
            .positions
            .get(storyteller.as_str().as_bytes())?
            .map(|raw| decode_u64(&raw))
            .unwrap_or(0))
    }

    // Milestone claims

    /// Insert-first-wins claim. Returns `false` when another run already holds it.
    ///
    /// A `Running` claim older than `stale_after` belonged to a run that never
    /// finished (the process died mid-analysis) and is taken over. Completed
    /// claims are never taken over.
    pub fn try_claim_milestone(
        &self,
        storyteller: &StorytellerId,
        milestone: u32,
        stale_after: chrono::Duration,
    ) -> Result<bool, StorageError> {
        let claimed_at = now();
        let claim = MilestoneClaim {
            storyteller_id: storyteller.clone(),
            milestone,
            status: ClaimStatus::Running,
            claimed_at,
            finished_at: None,
            prompts_persisted: 0,
        };
        let key = scoped_key(storyteller, &milestone.to_be_bytes());
        let swapped = self
            .claims
            .compare_and_swap(&key, None as Option<&[u8]>, Some(encode(&claim)?))?;
        let current = match swapped {
            Ok(()) => return Ok(true),
            Err(conflict) => conflict.current,
        };
        let Some(current) = current else {
            return Ok(false);
        };

        let held: MilestoneClaim = decode(TREE_CLAIMS, &current)?;
        if held.status != ClaimStatus::Running || held.claimed_at >= claimed_at - stale_after {
            return Ok(false);
        }
        let replaced = self
            .claims
            .compare_and_swap(&key, Some(current.as_ref()), Some(encode(&claim)?))?;
        if replaced.is_ok() {
            warn!(
                storyteller = %storyteller,
                milestone,
                stale_since = %held.claimed_at,
                "Took over stale milestone claim"
            );
        }
        Ok(replaced.is_ok())
    }

    pub fn complete_milestone_claim(
        &self,
        storyteller: &StorytellerId,
        milestone: u32,
        prompts_persisted: usize,
    ) -> Result<(), StorageError> {
        let key = scoped_key(storyteller, &milestone.to_be_bytes());
        let Some(mut claim) = get_json::<MilestoneClaim>(&self.claims, TREE_CLAIMS, &key)? else {
            return Ok(());
        };
        claim.status = ClaimStatus::Completed;
        claim.finished_at = Some(now());
        claim.prompts_persisted = prompts_persisted;
        self.claims.insert(key, encode(&claim)?)?;
        Ok(())
    }

    /// Drop a claim so a later request at the same count may retry
    pub fn release_milestone_claim(
        &self,
        storyteller: &StorytellerId,
        milestone: u32,
    ) -> Result<(), StorageError> {
        self.claims
            .remove(scoped_key(storyteller, &milestone.to_be_bytes()))?;
        Ok(())
    }

    pub fn get_milestone_claim(
        &self,
        storyteller: &StorytellerId,
        milestone: u32,
    ) -> Result<Option<MilestoneClaim>, StorageError> {
        get_json(&self.claims, TREE_CLAIMS, &scoped_key(storyteller, &milestone.to_be_bytes()))
    }
}

/// Read-and-increment the storyteller's position counter inside a transaction.
/// Every allocation goes through here so counters only move under isolation.
pub(crate) fn bump_position<E>(
    positions: &TransactionalTree,
    storyteller: &StorytellerId,
) -> ConflictableTransactionResult<u64, E> {
    let key = storyteller.as_str().as_bytes();
    let next = positions.get(key)?.map(|raw| decode_u64(&raw)).unwrap_or(0) + 1;
    positions.insert(key, next.to_be_bytes().to_vec())?;
    Ok(next)
}

pub(crate) fn from_transaction(err: TransactionError<StorageError>) -> StorageError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => e.into(),
    }
}

/// `storyteller \0 suffix`
pub(crate) fn scoped_key(storyteller: &StorytellerId, suffix: &[u8]) -> Vec<u8> {
    let mut key = scope_prefix(storyteller);
    key.extend_from_slice(suffix);
    key
}

pub(crate) fn scope_prefix(storyteller: &StorytellerId) -> Vec<u8> {
    let mut key = Vec::with_capacity(storyteller.as_str().len() + 9);
    key.extend_from_slice(storyteller.as_str().as_bytes());
    key.push(0);
    key
}

/// Big-endian ids keep prefix scans in id order
pub(crate) fn prompt_key(storyteller: &StorytellerId, id: PromptId) -> Vec<u8> {
    scoped_key(storyteller, &id.0.to_be_bytes())
}

pub(crate) fn encode_id(id: PromptId) -> [u8; 8] {
    id.0.to_be_bytes()
}

pub(crate) fn decode_id(raw: &[u8]) -> PromptId {
    PromptId(decode_u64(raw))
}

pub(crate) fn decode_u64(raw: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let len = raw.len().min(8);
    buf[8 - len..].copy_from_slice(&raw[raw.len() - len..]);
    u64::from_be_bytes(buf)
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(to_storage_data)
}

pub(crate) fn decode<T: DeserializeOwned>(tree: &'static str, raw: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(raw).map_err(|e| StorageError::Corrupt {
        tree,
        message: e.to_string(),
    })
}

fn get_json<T: DeserializeOwned>(
    tree: &Tree,
    name: &'static str,
    key: &[u8],
) -> Result<Option<T>, StorageError> {
    let Some(raw) = tree.get(key)? else {
        return Ok(None);
    };
    decode(name, &raw).map(Some)
}

fn scan_json<T: DeserializeOwned>(
    tree: &Tree,
    name: &'static str,
    storyteller: &StorytellerId,
) -> Result<Vec<T>, StorageError> {
    let mut out = Vec::new();
    for result in tree.scan_prefix(scope_prefix(storyteller)) {
        let (_, value) = result?;
        out.push(decode(name, &value)?);
    }
    Ok(out)
}

fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
}
