//! Shared test utilities for integration tests
//!
//! Engines over temp-dir stores, story builders, a scripted analyzer and a
//! recording notifier.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storyprompt::config::EngineConfig;
use storyprompt::outbox::{DeliveryError, Notifier, OutboxEvent};
use storyprompt::provider::{AnalysisResponse, CandidateMeta, InsightMeta, StoryAnalyzer};
use storyprompt::store::PromptStore;
use storyprompt::story::Story;
use storyprompt::types::{now, PrincipalId, StoryId, StorytellerId};
use storyprompt::{EngineError, PromptEngine, ProviderError};
use tempfile::TempDir;

/// Transcript with three anchors (Marcus, Duluth, Buick) that all render gate-safe prompts
pub const DULUTH: &str = "Marcus drove us to Duluth in his Buick.";

/// Engine plus the temp dir that owns its store
pub struct TestEngine {
    pub engine: PromptEngine,
    pub dir: TempDir,
}

impl std::ops::Deref for TestEngine {
    type Target = PromptEngine;

    fn deref(&self) -> &PromptEngine {
        &self.engine
    }
}

pub fn engine() -> TestEngine {
    engine_with(EngineConfig::default(), None)
}

pub fn engine_with(config: EngineConfig, analyzer: Option<Arc<dyn StoryAnalyzer>>) -> TestEngine {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&dir, config, analyzer).unwrap();
    TestEngine { engine, dir }
}

pub fn build_engine(
    dir: &TempDir,
    config: EngineConfig,
    analyzer: Option<Arc<dyn StoryAnalyzer>>,
) -> Result<PromptEngine, EngineError> {
    let store = PromptStore::open(dir.path().join("store"))?;
    let mut builder = PromptEngine::builder(store).config(config);
    if let Some(analyzer) = analyzer {
        builder = builder.analyzer(analyzer);
    }
    builder.build()
}

pub fn teller(id: &str) -> StorytellerId {
    StorytellerId::from(id)
}

/// The storyteller acting for themselves
pub fn me(id: &str) -> PrincipalId {
    PrincipalId::from(id)
}

/// Story created `offset` seconds from now, so creation order follows `offset`
pub fn story(storyteller: &str, id: &str, transcript: &str, offset: i64) -> Story {
    Story {
        id: StoryId::from(id),
        storyteller_id: StorytellerId::from(storyteller),
        title: None,
        transcript: transcript.to_string(),
        year: None,
        is_private: false,
        created_at: now() + ChronoDuration::seconds(offset),
    }
}

/// Record `count` eligible stories numbered from `start`
pub fn add_stories(engine: &PromptEngine, storyteller: &str, start: usize, count: usize) {
    for i in start..start + count {
        engine
            .add_story(
                &me(storyteller),
                story(storyteller, &format!("s{}", i), DULUTH, i as i64),
            )
            .unwrap();
    }
}

/// Analyzer returning a fixed response, counting calls
pub struct ScriptedAnalyzer {
    response: Result<AnalysisResponse, ProviderError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn prompts(texts: &[&str]) -> Self {
        Self::responding(Ok(AnalysisResponse {
            prompts: texts.iter().map(|t| CandidateMeta::new(*t)).collect(),
            insights: Vec::new(),
        }))
    }

    pub fn with_insight(mut self, insight_type: &str, content: &str) -> Self {
        if let Ok(response) = &mut self.response {
            response.insights.push(InsightMeta {
                insight_type: insight_type.to_string(),
                content: content.to_string(),
                confidence: Some(0.8),
            });
        }
        self
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::responding(Err(error))
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn responding(response: Result<AnalysisResponse, ProviderError>) -> Self {
        Self {
            response,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StoryAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, _stories: &[Story], _milestone: u32) -> Result<AnalysisResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }
}

/// Notifier that records deliveries and fails the first `failures` attempts
#[derive(Default)]
pub struct RecordingNotifier {
    pub delivered: Mutex<Vec<OutboxEvent>>,
    failures: AtomicUsize,
}

impl RecordingNotifier {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(failures),
        }
    }

    pub fn delivered(&self) -> Vec<OutboxEvent> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, event: &OutboxEvent) -> Result<(), DeliveryError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(DeliveryError("mail relay unavailable".to_string()));
        }
        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }
}
