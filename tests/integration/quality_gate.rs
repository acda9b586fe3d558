//! Quality gate properties

use proptest::prelude::*;
use storyprompt::quality::{self, GateCheck, BANNED_PHRASES, GENERIC_NOUNS, MAX_WORDS};

/// Words that are neither generic nouns nor pieces of a banned phrase
const SAFE_WORDS: &[&str] = &[
    "grandma", "drove", "Duluth", "winter", "1962", "Marcus", "kitchen", "radio", "bicycle",
    "river", "why", "did", "you", "leave", "when", "first", "who", "sang", "letters", "Buick",
];

fn safe_words() -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(prop::sample::select(SAFE_WORDS), 1..40)
}

#[test]
fn test_documented_example_fails() {
    assert!(!quality::validate(
        "Tell me more about your childhood in the old house?"
    ));
}

#[test]
fn test_report_lists_each_hard_failure() {
    let report = quality::report("Tell me more about your childhood in the old house?");
    let failed: Vec<GateCheck> = report.issues.iter().map(|i| i.check).collect();
    assert!(failed.contains(&GateCheck::BannedPhrases));
    assert!(failed.contains(&GateCheck::GenericNouns));
    assert!(!report.is_valid());
}

proptest! {
    #[test]
    fn validate_fails_iff_a_hard_rule_triggers(
        words in safe_words(),
        generic in prop::option::of(prop::sample::select(GENERIC_NOUNS)),
        banned in prop::option::of(prop::sample::select(BANNED_PHRASES)),
        insert_at in 0usize..40,
    ) {
        let mut parts: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        if let Some(noun) = generic {
            let at = insert_at.min(parts.len());
            parts.insert(at, noun.to_string());
        }
        if let Some(phrase) = banned {
            let at = (insert_at / 2).min(parts.len());
            parts.insert(at, phrase.to_string());
        }
        let text = format!("{}?", parts.join(" "));
        let word_count = text.split_whitespace().count();

        let expected_valid = word_count <= MAX_WORDS && generic.is_none() && banned.is_none();
        prop_assert_eq!(quality::validate(&text), expected_valid, "{}", text);
    }

    #[test]
    fn score_is_bounded_and_independent_of_validity(words in safe_words()) {
        let text = words.join(" ");
        let score = quality::score(&text);
        prop_assert!(score <= 100);
        prop_assert_eq!(score, quality::report(&text).score);
    }
}
