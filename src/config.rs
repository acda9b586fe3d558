//! Configuration System
//!
//! Layered TOML configuration deserialized into [`EngineConfig`]. Every field
//! has a serde default, so an empty file (or none at all) is a valid config.

use crate::error::EngineError;
use crate::generation::milestone::{
    DEFAULT_EXPIRY_DAYS as TIER3_EXPIRY_DAYS, DEFAULT_MILESTONES, DEFAULT_TIMEOUT,
};
use crate::generation::template::{DEFAULT_EXPIRY_DAYS as TIER1_EXPIRY_DAYS, DEFAULT_MAX_ANCHORS};
use crate::logging::LoggingConfig;
use crate::outbox::DEFAULT_MAX_ATTEMPTS;
use crate::queue::DEFAULT_CATALOG_SCORE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use crate::provider::{ProviderConfig, ProviderType};

mod facade;
mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod environment;
    pub mod global_file;
    pub mod workspace_file;
}

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    /// Tier 3 is disabled when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,

    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    pub outbox: OutboxConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled directory; relative paths resolve against the workspace root
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".storyprompt/store")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl StorageConfig {
    pub fn resolve(&self, workspace_root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            workspace_root.join(&self.path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_tier1_expiry_days")]
    pub tier1_expiry_days: i64,
    #[serde(default = "default_tier3_expiry_days")]
    pub tier3_expiry_days: i64,
    #[serde(default = "default_max_anchors")]
    pub max_anchors_per_story: usize,
    /// Stories generated in parallel by Tier 1
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_milestone_timeout_secs")]
    pub milestone_timeout_secs: u64,
    #[serde(default = "default_milestones")]
    pub milestones: Vec<u32>,
}

fn default_tier1_expiry_days() -> i64 {
    TIER1_EXPIRY_DAYS
}

fn default_tier3_expiry_days() -> i64 {
    TIER3_EXPIRY_DAYS
}

fn default_max_anchors() -> usize {
    DEFAULT_MAX_ANCHORS
}

fn default_concurrency() -> usize {
    4
}

fn default_milestone_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_milestones() -> Vec<u32> {
    DEFAULT_MILESTONES.to_vec()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            tier1_expiry_days: default_tier1_expiry_days(),
            tier3_expiry_days: default_tier3_expiry_days(),
            max_anchors_per_story: default_max_anchors(),
            concurrency: default_concurrency(),
            milestone_timeout_secs: default_milestone_timeout_secs(),
            milestones: default_milestones(),
        }
    }
}

impl GenerationConfig {
    pub fn milestone_timeout(&self) -> Duration {
        Duration::from_secs(self.milestone_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Ranking score for catalog prompts in next-prompt selection
    #[serde(default = "default_catalog_score")]
    pub catalog_score: u32,
}

fn default_catalog_score() -> u32 {
    DEFAULT_CATALOG_SCORE
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            catalog_score: default_catalog_score(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// storyteller id -> principals allowed to act for them
    #[serde(default)]
    pub delegations: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Storage(String),
    Generation(String),
    Queue(String),
    Provider(String),
    Outbox(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Generation(msg) => write!(f, "Generation: {}", msg),
            ValidationError::Queue(msg) => write!(f, "Queue: {}", msg),
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Outbox(msg) => write!(f, "Outbox: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl EngineConfig {
    /// Validate the entire configuration, collecting every problem
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage("path cannot be empty".to_string()));
        }

        let generation = &self.generation;
        if generation.tier1_expiry_days <= 0 || generation.tier3_expiry_days <= 0 {
            errors.push(ValidationError::Generation(
                "expiry days must be positive".to_string(),
            ));
        }
        if generation.max_anchors_per_story == 0 {
            errors.push(ValidationError::Generation(
                "max_anchors_per_story must be at least 1".to_string(),
            ));
        }
        if generation.concurrency == 0 {
            errors.push(ValidationError::Generation(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if generation.milestone_timeout_secs == 0 {
            errors.push(ValidationError::Generation(
                "milestone_timeout_secs must be at least 1".to_string(),
            ));
        }
        if generation.milestones.is_empty() {
            errors.push(ValidationError::Generation("milestones cannot be empty".to_string()));
        } else if generation.milestones.windows(2).any(|w| w[0] >= w[1]) || generation.milestones[0] == 0 {
            errors.push(ValidationError::Generation(
                "milestones must be positive and strictly increasing".to_string(),
            ));
        }

        if self.queue.catalog_score > 100 {
            errors.push(ValidationError::Queue(
                "catalog_score must be between 0 and 100".to_string(),
            ));
        }

        if let Some(provider) = &self.provider {
            errors.extend(provider.validate().into_iter().map(ValidationError::Provider));
        }

        if self.outbox.max_attempts == 0 {
            errors.push(ValidationError::Outbox("max_attempts must be at least 1".to_string()));
        }

        errors.extend(self.logging.validate().into_iter().map(ValidationError::Logging));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold problems into one error
    pub fn validated(self) -> Result<Self, EngineError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            EngineError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }

    /// Default configuration rendered as TOML, for `init`
    pub fn default_toml() -> Result<String, EngineError> {
        toml::to_string_pretty(&EngineConfig::default())
            .map_err(|e| EngineError::Config(format!("Failed to render default config: {}", e)))
    }
}
