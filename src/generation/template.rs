//! Tier 1 template generation
//!
//! Deterministic, per-story prompt synthesis: anchors are extracted from the
//! transcript, every template for the anchor's memory type is rendered and run
//! through the quality gate, and the best-scoring valid rendering becomes the
//! anchor's single candidate.

use crate::generation::anchor::{anchor_hash, extract_anchors, AnchorEntity};
use crate::generation::PromptCandidate;
use crate::quality;
use crate::story::Story;
use crate::types::{now, MemoryType, Tier};
use chrono::Duration;
use tracing::debug;

pub const DEFAULT_EXPIRY_DAYS: i64 = 7;
pub const DEFAULT_MAX_ANCHORS: usize = 6;

const PERSON_TEMPLATES: &[&str] = &[
    "What did {anchor} teach you that you still carry with you today?",
    "What would you say to {anchor} now that you never got to say?",
    "When did you feel closest to {anchor}, and what changed after that?",
];

const PLACE_TEMPLATES: &[&str] = &[
    "What did {anchor} smell and sound like the first time you arrived?",
    "Who were you when you left {anchor}, and who did you become?",
    "What did you lose when you left {anchor}?",
];

const OBJECT_TEMPLATES: &[&str] = &[
    "Where is {anchor} now, and who decided what happened to it?",
    "Why did {anchor} matter so much to you back then?",
];

const EVENT_TEMPLATES: &[&str] = &[
    "What did you feel in the moment {anchor} happened?",
    "Who was with you during {anchor}, and what did they do?",
];

const RELATIONSHIP_TEMPLATES: &[&str] = &[
    "How did your bond with {anchor} change over the years?",
    "What did {anchor} give you that nobody else could?",
];

const EMOTION_TEMPLATES: &[&str] = &[
    "When did you first feel {anchor}, and what caused it?",
    "Who helped you through {anchor}?",
];

/// Templates that need the story year
const YEAR_TEMPLATES: &[(MemoryType, &str)] = &[
    (MemoryType::Person, "What did {anchor} mean to you in {year} that you only realized later?"),
    (MemoryType::Place, "What did {anchor} look like to you in {year}?"),
    (MemoryType::Object, "What did {anchor} mean to you in {year}?"),
    (MemoryType::Event, "How did {anchor} in {year} change the way you lived?"),
];

fn templates_for(memory_type: MemoryType) -> &'static [&'static str] {
    match memory_type {
        MemoryType::Person => PERSON_TEMPLATES,
        MemoryType::Place => PLACE_TEMPLATES,
        MemoryType::Object => OBJECT_TEMPLATES,
        MemoryType::Event => EVENT_TEMPLATES,
        MemoryType::Relationship => RELATIONSHIP_TEMPLATES,
        MemoryType::Emotion => EMOTION_TEMPLATES,
    }
}

/// Result of generating for one story
#[derive(Debug, Clone, Default)]
pub struct TemplateOutput {
    pub candidates: Vec<PromptCandidate>,
    /// Anchors with no rendering that passed the gate
    pub rejected: usize,
}

#[derive(Debug, Clone)]
pub struct TemplateGenerator {
    expiry: Duration,
    max_anchors: usize,
}

impl Default for TemplateGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRY_DAYS, DEFAULT_MAX_ANCHORS)
    }
}

impl TemplateGenerator {
    pub fn new(expiry_days: i64, max_anchors: usize) -> Self {
        Self {
            expiry: Duration::days(expiry_days),
            max_anchors,
        }
    }

    /// Generate candidates for one story. Private or empty stories yield nothing.
    pub fn generate(&self, story: &Story) -> TemplateOutput {
        let mut output = TemplateOutput::default();
        if !story.is_eligible() {
            return output;
        }

        let expires_at = now() + self.expiry;
        for anchor in extract_anchors(&story.transcript, self.max_anchors) {
            match best_rendering(&anchor, story.year) {
                Some((text, score)) => {
                    output.candidates.push(PromptCandidate {
                        storyteller_id: story.storyteller_id.clone(),
                        story_id: Some(story.id.clone()),
                        text,
                        tier: Tier::Template,
                        context_note: Some(context_note(story, &anchor)),
                        anchor_entity: Some(anchor.name.clone()),
                        anchor_year: story.year,
                        anchor_hash: anchor_hash(story.id.as_str(), &anchor.name, anchor.memory_type),
                        memory_type: anchor.memory_type,
                        score,
                        expires_at,
                    });
                }
                None => {
                    debug!(
                        story = %story.id,
                        anchor = %anchor.name,
                        "No template rendering passed the quality gate"
                    );
                    output.rejected += 1;
                }
            }
        }
        output
    }
}

/// Highest-scoring valid rendering; earlier templates win ties.
fn best_rendering(anchor: &AnchorEntity, year: Option<i32>) -> Option<(String, u32)> {
    let shown = if anchor.quoted {
        format!("\"{}\"", anchor.name)
    } else {
        anchor.name.clone()
    };

    let mut renderings: Vec<String> = templates_for(anchor.memory_type)
        .iter()
        .map(|t| t.replace("{anchor}", &shown))
        .collect();
    if let Some(year) = year {
        renderings.extend(
            YEAR_TEMPLATES
                .iter()
                .filter(|(memory_type, _)| *memory_type == anchor.memory_type)
                .map(|(_, t)| t.replace("{anchor}", &shown).replace("{year}", &year.to_string())),
        );
    }

    let mut best: Option<(String, u32)> = None;
    for text in renderings {
        if !quality::validate(&text) {
            continue;
        }
        let score = quality::score(&text);
        if best.as_ref().map_or(true, |(_, s)| score > *s) {
            best = Some((text, score));
        }
    }
    best
}

fn context_note(story: &Story, anchor: &AnchorEntity) -> String {
    match &story.title {
        Some(title) => format!("{} ({}) from \"{}\"", anchor.name, anchor.memory_type, title),
        None => format!("{} ({}) from story {}", anchor.name, anchor.memory_type, story.id),
    }
}
