//! Durability of the sled-backed store across reopen

use storyprompt::config::EngineConfig;
use storyprompt::queue::PromptRef;
use storyprompt::types::{PromptSource, PromptStatus};
use tempfile::TempDir;

use super::test_utils::{build_engine, me, story, teller, DULUTH};

#[test]
fn test_queued_records_and_positions_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let first = PromptRef::Text("Who taught you to drive, and where?".to_string());
    let second = PromptRef::Text("What did your first paycheck buy?".to_string());

    {
        let engine = build_engine(&dir, EngineConfig::default(), None).unwrap();
        engine.add_story(&me("ada"), story("ada", "s1", DULUTH, 0)).unwrap();
        let queued = engine
            .queue(&me("ada"), &teller("ada"), &first, PromptSource::Catalog, None)
            .unwrap();
        assert_eq!(queued.record().queue_position(), Some(1));
        engine.store().flush().unwrap();
    }

    let engine = build_engine(&dir, EngineConfig::default(), None).unwrap();
    let records = engine.list_prompts(&me("ada"), &teller("ada")).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status(), PromptStatus::Queued);
    assert_eq!(records[0].queue_position(), Some(1));
    assert_eq!(engine.stories(&me("ada"), &teller("ada")).unwrap().len(), 1);

    let next = engine
        .queue(&me("ada"), &teller("ada"), &second, PromptSource::Catalog, None)
        .unwrap();
    assert_eq!(next.record().queue_position(), Some(2));
}

#[test]
fn test_catalog_text_resolves_to_the_same_record_after_reopen() {
    let dir = TempDir::new().unwrap();
    let text = PromptRef::Text("What song takes you straight back to 1965?".to_string());

    let id = {
        let engine = build_engine(&dir, EngineConfig::default(), None).unwrap();
        let resolved = engine
            .dismiss(&me("ada"), &teller("ada"), &text, PromptSource::Catalog, None)
            .unwrap();
        engine.store().flush().unwrap();
        resolved.outcome.record().id()
    };

    let engine = build_engine(&dir, EngineConfig::default(), None).unwrap();
    let queued = engine
        .queue(&me("ada"), &teller("ada"), &text, PromptSource::Catalog, None)
        .unwrap();
    assert_eq!(queued.record().id(), id);
    assert_eq!(engine.list_prompts(&me("ada"), &teller("ada")).unwrap().len(), 1);
}
