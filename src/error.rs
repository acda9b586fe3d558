//! Error types for the prompt lifecycle engine.

use crate::types::{PrincipalId, PromptSource, StorytellerId};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt record in {tree}: {message}")]
    Corrupt { tree: &'static str, message: String },
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::IoError(std::io::Error::new(
            std::io::ErrorKind::Other,
            err.to_string(),
        ))
    }
}

/// Text-generation provider errors. Always recoverable for Tier 3.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    AuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Provider model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Provider returned malformed output: {0}")]
    MalformedResponse(String),
}

/// Engine-level errors surfaced to callers
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {principal} may not act for storyteller {storyteller}")]
    AccessDenied {
        principal: PrincipalId,
        storyteller: StorytellerId,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("Generation provider error: {0}")]
    GenerationProvider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn prompt_not_found(source: PromptSource, id: impl std::fmt::Display) -> Self {
        EngineError::NotFound(format!("{} prompt {}", source, id))
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}
