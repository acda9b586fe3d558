//! Story analysis contract and its LLM-backed implementation.
//!
//! Providers are inconsistent about field names, so raw output is accepted in
//! several shapes and normalised into [`AnalysisResponse`].

use super::{ChatMessage, CompletionOptions, ModelProviderClient};
use crate::error::ProviderError;
use crate::story::Story;
use crate::types::MemoryType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const MILESTONE_SYSTEM_PROMPT: &str = include_str!("../../prompts/milestone-analysis.md");

/// Longest transcript excerpt sent per story
const MAX_TRANSCRIPT_CHARS: usize = 4000;

/// One prompt proposed by the provider, in canonical shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMeta {
    pub text: String,
    pub memory_type: Option<MemoryType>,
    pub anchor: Option<String>,
    pub year: Option<i32>,
    pub reasoning: Option<String>,
}

impl CandidateMeta {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            memory_type: None,
            anchor: None,
            year: None,
            reasoning: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightMeta {
    pub insight_type: String,
    pub content: String,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub prompts: Vec<CandidateMeta>,
    pub insights: Vec<InsightMeta>,
}

/// Cross-story analysis collaborator used by Tier 3
#[async_trait]
pub trait StoryAnalyzer: Send + Sync {
    /// `stories` are in creation order; `milestone` is the eligible story count.
    async fn analyze(
        &self,
        stories: &[Story],
        milestone: u32,
    ) -> Result<AnalysisResponse, ProviderError>;
}

/// [`StoryAnalyzer`] over a chat-completion client
pub struct LlmStoryAnalyzer {
    client: Arc<dyn ModelProviderClient>,
    options: CompletionOptions,
}

impl LlmStoryAnalyzer {
    pub fn new(client: Arc<dyn ModelProviderClient>, options: CompletionOptions) -> Self {
        Self { client, options }
    }
}

#[async_trait]
impl StoryAnalyzer for LlmStoryAnalyzer {
    async fn analyze(
        &self,
        stories: &[Story],
        milestone: u32,
    ) -> Result<AnalysisResponse, ProviderError> {
        let messages = vec![
            ChatMessage::system(MILESTONE_SYSTEM_PROMPT),
            ChatMessage::user(render_stories(stories, milestone)),
        ];
        debug!(
            provider = self.client.provider_name(),
            model = self.client.model_name(),
            stories = stories.len(),
            milestone,
            "Requesting milestone analysis"
        );
        let response = self.client.complete(messages, self.options.clone()).await?;
        parse_analysis(&response.content)
    }
}

fn render_stories(stories: &[Story], milestone: u32) -> String {
    let mut out = format!(
        "The storyteller has now recorded {} stories. Analyze them together.\n",
        milestone
    );
    for (index, story) in stories.iter().enumerate() {
        out.push_str(&format!("\n## Story {}", index + 1));
        if let Some(title) = &story.title {
            out.push_str(&format!(": {}", title));
        }
        if let Some(year) = story.year {
            out.push_str(&format!(" ({})", year));
        }
        out.push('\n');
        let transcript: String = story.transcript.chars().take(MAX_TRANSCRIPT_CHARS).collect();
        out.push_str(transcript.trim());
        out.push('\n');
    }
    out
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocument {
    List(Vec<RawPrompt>),
    Full(RawAnalysis),
}

#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default, alias = "questions", alias = "candidates")]
    prompts: Vec<RawPrompt>,
    #[serde(default, alias = "character_insights", alias = "characterInsights")]
    insights: Vec<RawInsight>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrompt {
    Bare(String),
    Shaped(RawPromptFields),
}

#[derive(Deserialize)]
struct RawPromptFields {
    #[serde(default, alias = "prompt", alias = "question", alias = "prompt_text")]
    text: Option<String>,
    #[serde(default, alias = "memoryType", alias = "type", alias = "category")]
    memory_type: Option<String>,
    #[serde(default, alias = "anchor_entity", alias = "anchorEntity", alias = "entity")]
    anchor: Option<String>,
    #[serde(default, alias = "anchor_year", alias = "anchorYear")]
    year: Option<serde_json::Value>,
    #[serde(default, alias = "rationale", alias = "why")]
    reasoning: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInsight {
    Bare(String),
    Shaped(RawInsightFields),
}

#[derive(Deserialize)]
struct RawInsightFields {
    #[serde(default, alias = "type", alias = "insightType", alias = "category")]
    insight_type: Option<String>,
    #[serde(default, alias = "insight", alias = "text", alias = "description")]
    content: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Normalise raw provider output. Prompts with no text are dropped.
pub fn parse_analysis(content: &str) -> Result<AnalysisResponse, ProviderError> {
    let body = strip_fences(content);
    let document: RawDocument = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("analysis is not valid JSON: {}", e)))?;
    let (prompts, insights) = match document {
        RawDocument::List(prompts) => (prompts, Vec::new()),
        RawDocument::Full(full) => (full.prompts, full.insights),
    };

    Ok(AnalysisResponse {
        prompts: prompts.into_iter().filter_map(normalize_prompt).collect(),
        insights: insights.into_iter().filter_map(normalize_insight).collect(),
    })
}

fn normalize_prompt(raw: RawPrompt) -> Option<CandidateMeta> {
    let fields = match raw {
        RawPrompt::Bare(text) => return non_empty(text).map(CandidateMeta::new),
        RawPrompt::Shaped(fields) => fields,
    };
    Some(CandidateMeta {
        text: non_empty(fields.text?)?,
        memory_type: fields.memory_type.as_deref().map(MemoryType::from_label),
        anchor: fields.anchor.and_then(non_empty),
        year: fields.year.as_ref().and_then(parse_year),
        reasoning: fields.reasoning.and_then(non_empty),
    })
}

fn normalize_insight(raw: RawInsight) -> Option<InsightMeta> {
    match raw {
        RawInsight::Bare(content) => non_empty(content).map(|content| InsightMeta {
            insight_type: "general".to_string(),
            content,
            confidence: None,
        }),
        RawInsight::Shaped(fields) => Some(InsightMeta {
            insight_type: fields
                .insight_type
                .and_then(non_empty)
                .unwrap_or_else(|| "general".to_string()),
            content: non_empty(fields.content?)?,
            confidence: fields.confidence.map(|c| c.clamp(0.0, 1.0)),
        }),
    }
}

fn parse_year(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        serde_json::Value::String(s) => s.trim().trim_end_matches('s').parse().ok(),
        _ => None,
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Remove a surrounding Markdown code fence if present
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use crate::types::{now, StoryId, StorytellerId};

    #[test]
    fn canonical_shape_parses() {
        let response = parse_analysis(
            r#"{"prompts": [{"text": "What did Marcus never tell you?", "memory_type": "person",
                "anchor": "Marcus", "year": 1962, "reasoning": "recurring figure"}],
                "insights": [{"insight_type": "theme", "content": "Loyalty", "confidence": 0.8}]}"#,
        )
        .unwrap();
        assert_eq!(response.prompts.len(), 1);
        let prompt = &response.prompts[0];
        assert_eq!(prompt.memory_type, Some(MemoryType::Person));
        assert_eq!(prompt.anchor.as_deref(), Some("Marcus"));
        assert_eq!(prompt.year, Some(1962));
        assert_eq!(response.insights[0].insight_type, "theme");
    }

    #[test]
    fn heterogeneous_field_names_are_normalised() {
        let response = parse_analysis(
            "```json\n{\"questions\": [\"Who did you become after Duluth?\", \
             {\"question\": \"Why did you forgive Marcus?\", \"memoryType\": \"relationship\", \
              \"anchorEntity\": \"Marcus\", \"anchorYear\": \"1970s\", \"rationale\": \"arc\"}, \
             {\"memoryType\": \"place\"}], \
             \"characterInsights\": [\"Resilient\", {\"type\": \"value\", \"insight\": \"Family first\", \"confidence\": 4}]}\n```",
        )
        .unwrap();
        assert_eq!(response.prompts.len(), 2);
        assert_eq!(response.prompts[0].memory_type, None);
        assert_eq!(response.prompts[1].memory_type, Some(MemoryType::Relationship));
        assert_eq!(response.prompts[1].year, Some(1970));
        assert_eq!(response.prompts[1].reasoning.as_deref(), Some("arc"));
        assert_eq!(response.insights.len(), 2);
        assert_eq!(response.insights[0].insight_type, "general");
        assert_eq!(response.insights[1].confidence, Some(1.0));
    }

    #[test]
    fn bare_list_of_prompts_parses() {
        let response = parse_analysis(r#"["What did you lose in 1962?"]"#).unwrap();
        assert_eq!(response.prompts.len(), 1);
        assert!(response.insights.is_empty());
    }

    #[test]
    fn prose_is_malformed() {
        assert!(matches!(
            parse_analysis("Here are some great questions!"),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn llm_analyzer_parses_client_output() {
        let client = Arc::new(MockProvider::new(vec![Ok(
            r#"{"prompts": ["What did you feel the day you left Duluth?"]}"#.to_string(),
        )]));
        let analyzer = LlmStoryAnalyzer::new(client, CompletionOptions::default());
        let story = Story {
            id: StoryId::from("s1"),
            storyteller_id: StorytellerId::from("t"),
            title: Some("Leaving".to_string()),
            transcript: "We left Duluth in the spring.".to_string(),
            year: Some(1962),
            is_private: false,
            created_at: now(),
        };
        let response = analyzer.analyze(&[story], 1).await.unwrap();
        assert_eq!(response.prompts.len(), 1);
    }

    #[tokio::test]
    async fn llm_analyzer_propagates_client_errors() {
        let client = Arc::new(MockProvider::new(vec![Err(ProviderError::RateLimited(
            "slow down".to_string(),
        ))]));
        let analyzer = LlmStoryAnalyzer::new(client, CompletionOptions::default());
        assert!(matches!(
            analyzer.analyze(&[], 1).await,
            Err(ProviderError::RateLimited(_))
        ));
    }
}
