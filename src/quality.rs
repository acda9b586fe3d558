//! Quality Gate
//!
//! Deterministic validation and scoring of candidate prompt text. All matching
//! is case-insensitive and word-bounded; nothing here touches storage.

use serde::{Deserialize, Serialize};

/// Hard limit on prompt length in words
pub const MAX_WORDS: usize = 30;
/// Prompts at or above this length pass with a warning
pub const WARN_WORDS: usize = 26;

/// Words too vague to ground a prompt in a specific memory
pub const GENERIC_NOUNS: &[&str] = &[
    "girl", "boy", "man", "woman", "person", "people", "house", "room", "thing", "things",
    "place", "stuff", "someone", "something", "kid", "guy", "lady",
];

/// Filler interview phrases that never lead anywhere new
pub const BANNED_PHRASES: &[&str] = &[
    "tell me more",
    "what else",
    "describe the",
    "can you describe",
    "talk about",
    "how did that make you feel",
    "anything else",
    "share more",
    "elaborate on",
];

/// Words that signal the prompt reaches for emotional depth
pub const EMOTIONAL_SIGNALS: &[&str] = &[
    "felt", "feel", "realized", "chose", "lost", "never", "always", "regret", "proud", "afraid",
    "decided", "learned", "forgave", "missed", "hoped", "changed", "mattered",
];

const BASE_SCORE: i32 = 40;
const QUESTION_BONUS: i32 = 10;
const EMOTION_BONUS: i32 = 6;
const EMOTION_BONUS_CAP: i32 = 18;
const QUOTE_BONUS: i32 = 15;
const GENERIC_PENALTY: i32 = 10;
const GENERIC_PENALTY_CAP: i32 = 20;
const BANNED_PENALTY: i32 = 15;
const BANNED_PENALTY_CAP: i32 = 30;
const MAX_SCORE: i32 = 100;

/// Individual gate rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCheck {
    WordCount,
    GenericNouns,
    BannedPhrases,
    QuestionMark,
    EmotionalDepth,
    QuotedPhrase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateFinding {
    pub check: GateCheck,
    pub message: String,
}

/// Diagnostic breakdown for one candidate text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub word_count: usize,
    pub score: u32,
    /// Hard failures; any entry means the text is invalid
    pub issues: Vec<GateFinding>,
    /// Soft signals that lower confidence without failing
    pub warnings: Vec<GateFinding>,
    pub passed_checks: Vec<GateCheck>,
}

impl QualityReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Text features every rule works from
struct Analysis {
    word_count: usize,
    normalized: String,
    generic_hits: Vec<&'static str>,
    banned_hits: Vec<&'static str>,
    emotional_hits: Vec<&'static str>,
    has_question: bool,
    has_quote: bool,
}

impl Analysis {
    fn of(text: &str) -> Self {
        let words = normalized_words(text);
        let normalized = format!(" {} ", words.join(" "));

        let generic_hits = GENERIC_NOUNS
            .iter()
            .copied()
            .filter(|noun| words.iter().any(|w| w == noun))
            .collect();
        let banned_hits = BANNED_PHRASES
            .iter()
            .copied()
            .filter(|phrase| normalized.contains(&format!(" {} ", phrase)))
            .collect();
        let emotional_hits = EMOTIONAL_SIGNALS
            .iter()
            .copied()
            .filter(|signal| words.iter().any(|w| w == signal))
            .collect();

        Self {
            word_count: text.split_whitespace().count(),
            normalized,
            generic_hits,
            banned_hits,
            emotional_hits,
            has_question: text.contains('?'),
            has_quote: has_quoted_phrase(text),
        }
    }

    fn is_valid(&self) -> bool {
        self.word_count <= MAX_WORDS && self.generic_hits.is_empty() && self.banned_hits.is_empty()
    }

    fn score(&self) -> u32 {
        let mut score = BASE_SCORE;
        if self.has_question {
            score += QUESTION_BONUS;
        }
        score += match self.word_count {
            0..=7 => 0,
            8..=20 => 15,
            21..=25 => 10,
            26..=MAX_WORDS => 5,
            _ => -15,
        };
        score += (self.emotional_hits.len() as i32 * EMOTION_BONUS).min(EMOTION_BONUS_CAP);
        if self.has_quote {
            score += QUOTE_BONUS;
        }
        score -= (self.generic_hits.len() as i32 * GENERIC_PENALTY).min(GENERIC_PENALTY_CAP);
        score -= (self.banned_hits.len() as i32 * BANNED_PENALTY).min(BANNED_PENALTY_CAP);
        score.clamp(0, MAX_SCORE) as u32
    }
}

/// `false` iff the text breaks a hard rule: too long, a generic noun, or a
/// banned phrase.
pub fn validate(text: &str) -> bool {
    Analysis::of(text).is_valid()
}

/// Weighted quality score in `0..=100`, computed whether or not the text is valid.
pub fn score(text: &str) -> u32 {
    Analysis::of(text).score()
}

pub fn report(text: &str) -> QualityReport {
    let analysis = Analysis::of(text);
    let mut issues = Vec::new();
    let mut warnings = Vec::new();
    let mut passed_checks = Vec::new();

    if analysis.word_count > MAX_WORDS {
        issues.push(GateFinding {
            check: GateCheck::WordCount,
            message: format!(
                "{} words exceeds the {} word limit",
                analysis.word_count, MAX_WORDS
            ),
        });
    } else if analysis.word_count >= WARN_WORDS {
        warnings.push(GateFinding {
            check: GateCheck::WordCount,
            message: format!("{} words is close to the limit", analysis.word_count),
        });
    } else {
        passed_checks.push(GateCheck::WordCount);
    }

    if analysis.generic_hits.is_empty() {
        passed_checks.push(GateCheck::GenericNouns);
    } else {
        issues.push(GateFinding {
            check: GateCheck::GenericNouns,
            message: format!("generic nouns: {}", analysis.generic_hits.join(", ")),
        });
    }

    if analysis.banned_hits.is_empty() {
        passed_checks.push(GateCheck::BannedPhrases);
    } else {
        issues.push(GateFinding {
            check: GateCheck::BannedPhrases,
            message: format!("banned phrases: {}", analysis.banned_hits.join(", ")),
        });
    }

    if analysis.has_question {
        passed_checks.push(GateCheck::QuestionMark);
    } else {
        warnings.push(GateFinding {
            check: GateCheck::QuestionMark,
            message: "no question mark".to_string(),
        });
    }

    if !analysis.emotional_hits.is_empty() {
        passed_checks.push(GateCheck::EmotionalDepth);
    }
    if analysis.has_quote {
        passed_checks.push(GateCheck::QuotedPhrase);
    }

    let score = analysis.score();
    tracing::trace!(
        normalized = %analysis.normalized.trim(),
        score,
        issues = issues.len(),
        "Quality report computed"
    );

    QualityReport {
        word_count: analysis.word_count,
        score,
        issues,
        warnings,
        passed_checks,
    }
}

/// Lowercased alphanumeric words; apostrophes stay inside words.
fn normalized_words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .map(|w| w.trim_matches(|c| c == '\'' || c == '\u{2019}'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// At least one non-empty span between a pair of double quotes (straight or curly).
pub(crate) fn has_quoted_phrase(text: &str) -> bool {
    !quoted_phrases(text).is_empty()
}

pub(crate) fn quoted_phrases(text: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut current: Option<String> = None;
    for c in text.chars() {
        match (c, current.as_mut()) {
            ('"' | '\u{201C}' | '\u{201D}', None) => current = Some(String::new()),
            ('"' | '\u{201C}' | '\u{201D}', Some(buf)) => {
                let phrase = buf.trim().to_string();
                if phrase.chars().any(char::is_alphanumeric) {
                    phrases.push(phrase);
                }
                current = None;
            }
            (c, Some(buf)) => buf.push(c),
            (_, None) => {}
        }
    }
    phrases
}
