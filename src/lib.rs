//! storyprompt: Prompt Lifecycle & Quality Engine
//!
//! Generates conversation prompts from a storyteller's stories, gates them on
//! deterministic quality rules, and tracks each prompt through queueing,
//! dismissal and skip-driven retirement into history.

pub mod access;
pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod family;
pub mod generation;
pub mod lifecycle;
pub mod logging;
pub mod outbox;
pub mod provider;
pub mod quality;
pub mod queue;
pub mod store;
pub mod story;
pub mod types;

pub use api::{GenerateReport, GenerateRequest, NextPrompt, PromptEngine, TierSelection};
pub use error::{EngineError, ProviderError, StorageError};
