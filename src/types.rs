//! Core identifier and enumeration types shared across the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

pub type Timestamp = DateTime<Utc>;

/// Current UTC time
pub fn now() -> Timestamp {
    Utc::now()
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Reject values that cannot be used as a storage key segment
            pub fn check_key_safe(&self) -> Result<(), EngineError> {
                if self.0.is_empty() {
                    return Err(EngineError::Validation(format!("{} cannot be empty", stringify!($name))));
                }
                if self.0.contains('\0') {
                    return Err(EngineError::Validation(format!(
                        "{} cannot contain a NUL byte",
                        stringify!($name)
                    )));
                }
                Ok(())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Owner of stories and every prompt record derived from them
    StorytellerId
);
string_id!(StoryId);
string_id!(
    /// Acting party on a request (the storyteller or a delegated collaborator)
    PrincipalId
);

/// Store-assigned prompt identifier, unique within the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptId(pub u64);

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PromptId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(PromptId)
    }
}

/// Physical partition a queueable prompt lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSource {
    Ai,
    Catalog,
}

impl fmt::Display for PromptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptSource::Ai => f.write_str("ai"),
            PromptSource::Catalog => f.write_str("catalog"),
        }
    }
}

impl FromStr for PromptSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" | "generated" => Ok(PromptSource::Ai),
            "catalog" | "library" => Ok(PromptSource::Catalog),
            other => Err(format!(
                "Invalid prompt source '{}' (must be 'ai' or 'catalog')",
                other
            )),
        }
    }
}

/// Lifecycle state of a persisted prompt. Retirement is not a status: retired
/// prompts only exist as history records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStatus {
    Active,
    Queued,
    Dismissed,
}

impl fmt::Display for PromptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptStatus::Active => f.write_str("active"),
            PromptStatus::Queued => f.write_str("queued"),
            PromptStatus::Dismissed => f.write_str("dismissed"),
        }
    }
}

/// Generation tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Tier {
    /// Deterministic per-story templates
    Template,
    /// Provider-backed cross-story milestone analysis
    Milestone,
}

impl Tier {
    pub fn number(self) -> u8 {
        match self {
            Tier::Template => 1,
            Tier::Milestone => 3,
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.number()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Tier::Template),
            3 => Ok(Tier::Milestone),
            other => Err(format!("Unknown tier {}", other)),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier{}", self.number())
    }
}

/// Kind of memory a prompt is anchored on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Person,
    Place,
    Object,
    Event,
    Relationship,
    Emotion,
}

impl MemoryType {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryType::Person => "person",
            MemoryType::Place => "place",
            MemoryType::Object => "object",
            MemoryType::Event => "event",
            MemoryType::Relationship => "relationship",
            MemoryType::Emotion => "emotion",
        }
    }

    /// Lenient mapping from provider vocabulary. Unknown labels become `Event`.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "person" | "people" | "character" | "individual" => MemoryType::Person,
            "place" | "location" | "setting" => MemoryType::Place,
            "object" | "item" | "artifact" | "possession" => MemoryType::Object,
            "relationship" | "family" | "bond" => MemoryType::Relationship,
            "emotion" | "feeling" | "emotional" | "turning_point" => MemoryType::Emotion,
            _ => MemoryType::Event,
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
