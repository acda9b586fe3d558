//! Anchor entity extraction and anchor hashing.
//!
//! Entities are runs of capitalised words (plus quoted phrases) pulled out of a
//! transcript with fixed heuristics; each is classified into a [`MemoryType`]
//! from the surrounding words.

use crate::quality::quoted_phrases;
use crate::types::MemoryType;
use blake3::Hasher;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// Capitalised words that are never anchors on their own
const STOPWORDS: &[&str] = &[
    "i", "i'm", "i'd", "i've", "the", "a", "an", "we", "my", "our", "it", "he", "she", "they",
    "then", "and", "but", "so", "when", "after", "before", "that", "this", "there", "you",
    "your", "his", "her", "their", "in", "on", "at", "of", "oh", "well", "yes", "no", "what",
    "why", "how", "who", "where", "if", "one", "every", "some", "all", "now", "later", "back",
    "once", "anyway", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday",
    "sunday", "january", "february", "march", "april", "may", "june", "july", "august",
    "september", "october", "november", "december", "christmas", "god",
];

const PERSON_TITLES: &[&str] = &[
    "aunt", "uncle", "grandma", "grandpa", "grandmother", "grandfather", "mr", "mrs", "ms", "dr",
    "mom", "dad", "mother", "father", "sister", "brother", "cousin", "nana", "papa",
];

const PLACE_SUFFIXES: &[&str] = &[
    "street", "avenue", "road", "lake", "river", "park", "city", "county", "school", "church",
    "hospital", "beach", "mountain", "island", "valley", "bay", "station", "base", "farm",
];

const PLACE_PRECEDERS: &[&str] = &[
    "in", "at", "to", "from", "near", "into", "through", "across", "visited", "outside",
];

const PERSON_PRECEDERS: &[&str] = &["with", "told", "asked", "met", "married", "called", "named"];

const PERSON_FOLLOWERS: &[&str] = &["said", "told", "asked", "laughed", "cried", "was", "had"];

const OBJECT_PRECEDERS: &[&str] = &["the", "a", "an", "our", "my", "his", "her", "their", "old"];

/// A named person, place or thing pulled from a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorEntity {
    pub name: String,
    pub memory_type: MemoryType,
    pub mentions: usize,
    /// Came from a quoted phrase rather than capitalised words
    pub quoted: bool,
    /// Token index of the first mention, used for stable ordering
    pub first_seen: usize,
}

#[derive(Debug)]
struct Token {
    text: String,
    sentence_start: bool,
}

/// Extract up to `limit` anchors, most-mentioned first, first mention breaking ties.
pub fn extract_anchors(transcript: &str, limit: usize) -> Vec<AnchorEntity> {
    let tokens = tokenize(transcript);
    let mut found: HashMap<String, AnchorEntity> = HashMap::new();

    let mut i = 0;
    while i < tokens.len() {
        if !is_capitalized(&tokens[i].text) {
            i += 1;
            continue;
        }
        let start = i;
        while i < tokens.len() && is_capitalized(&tokens[i].text) && (i == start || !tokens[i].sentence_start) {
            i += 1;
        }
        let mut run: Vec<&str> = tokens[start..i].iter().map(|t| t.text.as_str()).collect();
        let mut run_start = start;
        while let Some(first) = run.first() {
            if STOPWORDS.contains(&first.to_lowercase().as_str()) {
                run.remove(0);
                run_start += 1;
            } else {
                break;
            }
        }
        if run.is_empty() {
            continue;
        }

        let name = run.join(" ");
        let previous = run_start
            .checked_sub(1)
            .map(|p| tokens[p].text.to_lowercase());
        let next = tokens.get(i).map(|t| t.text.to_lowercase());
        let memory_type = classify(&run, previous.as_deref(), next.as_deref());
        record(&mut found, name, memory_type, false, run_start);
    }

    for phrase in quoted_phrases(transcript) {
        let phrase = phrase
            .trim_end_matches(|c: char| c.is_ascii_punctuation())
            .to_string();
        if !phrase.is_empty() && phrase.split_whitespace().count() <= 5 {
            record(&mut found, phrase, MemoryType::Object, true, tokens.len());
        }
    }

    let mut anchors: Vec<AnchorEntity> = found.into_values().collect();
    anchors.sort_by(|a, b| {
        b.mentions
            .cmp(&a.mentions)
            .then_with(|| a.first_seen.cmp(&b.first_seen))
            .then_with(|| a.name.cmp(&b.name))
    });
    anchors.truncate(limit);
    anchors
}

fn record(
    found: &mut HashMap<String, AnchorEntity>,
    name: String,
    memory_type: MemoryType,
    quoted: bool,
    position: usize,
) {
    let key = normalize_anchor(&name);
    found
        .entry(key)
        .and_modify(|e| e.mentions += 1)
        .or_insert(AnchorEntity {
            name,
            memory_type,
            mentions: 1,
            quoted,
            first_seen: position,
        });
}

fn classify(run: &[&str], previous: Option<&str>, next: Option<&str>) -> MemoryType {
    let lowered: Vec<String> = run.iter().map(|w| w.to_lowercase()).collect();
    if lowered.iter().any(|w| PERSON_TITLES.contains(&w.as_str())) {
        return MemoryType::Person;
    }
    if lowered.iter().any(|w| PLACE_SUFFIXES.contains(&w.as_str())) {
        return MemoryType::Place;
    }
    if previous.map_or(false, |p| PLACE_PRECEDERS.contains(&p)) {
        return MemoryType::Place;
    }
    if previous.map_or(false, |p| PERSON_PRECEDERS.contains(&p))
        || next.map_or(false, |n| PERSON_FOLLOWERS.contains(&n))
    {
        return MemoryType::Person;
    }
    if previous.map_or(false, |p| OBJECT_PRECEDERS.contains(&p)) {
        return MemoryType::Object;
    }
    // A capitalised name mid-sentence with no other cue is most often a person.
    MemoryType::Person
}

fn tokenize(transcript: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut sentence_start = true;
    for raw in transcript.split_whitespace() {
        let ends_sentence = raw.ends_with(['.', '!', '?']) || raw.ends_with(".\"");
        let text = raw
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
            .trim_end_matches("'s")
            .trim_matches('\'')
            .to_string();
        if !text.is_empty() {
            tokens.push(Token {
                text,
                sentence_start,
            });
        }
        sentence_start = ends_sentence;
    }
    tokens
}

fn is_capitalized(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.is_uppercase() && !word.chars().all(|c| c.is_numeric()),
        None => false,
    }
}

/// NFC, lowercased, single-spaced form used for identity comparisons
pub fn normalize_anchor(anchor: &str) -> String {
    let composed: String = anchor.nfc().collect();
    composed
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compute the anchor hash for a candidate
///
/// AnchorHash = hash("scope:" || scope || "anchor:" || normalized anchor || "type:" || memory type)
///
/// `scope` is the story id for Tier 1 candidates and a milestone scope string for
/// Tier 3 candidates.
pub fn anchor_hash(scope: &str, anchor: &str, memory_type: MemoryType) -> String {
    let mut hasher = Hasher::new();
    hasher.update(b"scope:");
    hasher.update(scope.as_bytes());
    hasher.update(b"anchor:");
    hasher.update(normalize_anchor(anchor).as_bytes());
    hasher.update(b"type:");
    hasher.update(memory_type.as_str().as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}
