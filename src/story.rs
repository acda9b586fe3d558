//! Story records supplied by the story collaborator.

use crate::types::{StoryId, StorytellerId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub storyteller_id: StorytellerId,
    #[serde(default)]
    pub title: Option<String>,
    pub transcript: String,
    /// Year the story takes place in, when known
    #[serde(default)]
    pub year: Option<i32>,
    /// Private stories are never fed into generation or milestone counts
    #[serde(default)]
    pub is_private: bool,
    pub created_at: Timestamp,
}

impl Story {
    pub fn is_eligible(&self) -> bool {
        !self.is_private && !self.transcript.trim().is_empty()
    }
}

/// Eligible stories for a storyteller in creation order (id breaks ties).
pub fn eligible_in_creation_order(stories: Vec<Story>) -> Vec<Story> {
    let mut eligible: Vec<Story> = stories.into_iter().filter(Story::is_eligible).collect();
    eligible.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    eligible
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn story(id: &str, private: bool, secs: i64) -> Story {
        Story {
            id: StoryId::from(id),
            storyteller_id: StorytellerId::from("s1"),
            title: None,
            transcript: "We drove to Duluth.".to_string(),
            year: Some(1971),
            is_private: private,
            created_at: chrono::Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn private_stories_are_excluded_and_order_is_by_creation() {
        let stories = vec![story("b", false, 20), story("p", true, 5), story("a", false, 10)];
        let ordered = eligible_in_creation_order(stories);
        let ids: Vec<&str> = ordered.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
