//! After-commit notification outbox
//!
//! Tasks are written only once the originating change has committed, and are
//! delivered later by [`Outbox::dispatch`]. Delivery failures are retried up to
//! a fixed attempt budget and never affect the write that produced the task.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::StorageError;
use crate::store::persistence::{decode, encode, TREE_OUTBOX};
use crate::store::PromptStore;
use crate::types::{now, PrincipalId, PromptId, StorytellerId, Timestamp};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboxEvent {
    PromptsGenerated {
        storyteller_id: StorytellerId,
        persisted: usize,
    },
    FamilyPromptSubmitted {
        storyteller_id: StorytellerId,
        prompt_id: PromptId,
        submitted_by: PrincipalId,
    },
}

impl OutboxEvent {
    pub fn storyteller_id(&self) -> &StorytellerId {
        match self {
            OutboxEvent::PromptsGenerated { storyteller_id, .. }
            | OutboxEvent::FamilyPromptSubmitted { storyteller_id, .. } => storyteller_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutboxEvent::PromptsGenerated { .. } => "prompts_generated",
            OutboxEvent::FamilyPromptSubmitted { .. } => "family_prompt_submitted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    /// Attempt budget exhausted; kept for inspection
    DeadLettered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxTask {
    pub id: u64,
    pub event: OutboxEvent,
    pub status: TaskStatus,
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub last_attempt_at: Option<Timestamp>,
}

#[derive(Debug, Error)]
#[error("Delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Delivery channel for outbox events
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, event: &OutboxEvent) -> Result<(), DeliveryError>;
}

/// Writes each event to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, event: &OutboxEvent) -> Result<(), DeliveryError> {
        info!(kind = event.kind(), storyteller = %event.storyteller_id(), event = ?event, "Notification");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

#[derive(Clone)]
pub struct Outbox {
    store: PromptStore,
    max_attempts: u32,
}

impl Outbox {
    pub fn new(store: PromptStore, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn enqueue(&self, event: OutboxEvent) -> Result<OutboxTask, StorageError> {
        let task = OutboxTask {
            id: self.store.generate_id()?,
            event,
            status: TaskStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now(),
            last_attempt_at: None,
        };
        self.put(&task)?;
        Ok(task)
    }

    /// Enqueue, logging instead of failing. Used after a write has already committed.
    pub fn enqueue_after_commit(&self, event: OutboxEvent) {
        let kind = event.kind();
        if let Err(e) = self.enqueue(event) {
            warn!(kind, error = %e, "Failed to enqueue notification");
        }
    }

    /// All tasks in enqueue order
    pub fn tasks(&self) -> Result<Vec<OutboxTask>, StorageError> {
        let mut tasks = Vec::new();
        for result in self.store.outbox().iter() {
            let (_, value) = result?;
            tasks.push(decode(TREE_OUTBOX, &value)?);
        }
        Ok(tasks)
    }

    pub fn pending(&self) -> Result<Vec<OutboxTask>, StorageError> {
        Ok(self
            .tasks()?
            .into_iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .collect())
    }

    /// Attempt every pending task once
    pub async fn dispatch(&self, notifier: &dyn Notifier) -> Result<DispatchReport, StorageError> {
        let mut report = DispatchReport::default();
        for mut task in self.pending()? {
            task.attempts += 1;
            task.last_attempt_at = Some(now());
            match notifier.deliver(&task.event).await {
                Ok(()) => {
                    self.store.outbox().remove(task.id.to_be_bytes())?;
                    report.delivered += 1;
                }
                Err(e) => {
                    task.last_error = Some(e.to_string());
                    if task.attempts >= self.max_attempts {
                        task.status = TaskStatus::DeadLettered;
                        report.dead_lettered += 1;
                        warn!(task = task.id, kind = task.event.kind(), attempts = task.attempts, error = %e, "Notification dead-lettered");
                    } else {
                        report.retried += 1;
                        warn!(task = task.id, kind = task.event.kind(), attempts = task.attempts, error = %e, "Notification failed, will retry");
                    }
                    self.put(&task)?;
                }
            }
        }
        Ok(report)
    }

    fn put(&self, task: &OutboxTask) -> Result<(), StorageError> {
        self.store.outbox().insert(task.id.to_be_bytes(), encode(task)?)?;
        Ok(())
    }
}
