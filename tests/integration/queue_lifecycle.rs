//! Queue, dismiss, skip and archive behavior through the engine API

use super::test_utils::{engine, me, story, teller, DULUTH};
use storyprompt::lifecycle::{PromptRecord, SkipOutcome};
use storyprompt::queue::{DismissOutcome, PromptRef, QueueOutcome};
use storyprompt::store::HistoryOutcome;
use storyprompt::types::{PromptId, PromptSource, PromptStatus, StoryId};
use storyprompt::{GenerateRequest, PromptEngine, TierSelection};

async fn generated(engine: &PromptEngine, storyteller: &str) -> Vec<PromptRecord> {
    engine
        .add_story(&me(storyteller), story(storyteller, "s1", DULUTH, 0))
        .unwrap();
    engine
        .generate(
            &me(storyteller),
            GenerateRequest {
                storyteller_id: teller(storyteller),
                story_ids: vec![StoryId::from("s1")],
                tier: TierSelection::Template,
            },
        )
        .await
        .unwrap();
    engine.list_prompts(&me(storyteller), &teller(storyteller)).unwrap()
}

fn first_ai_id(records: &[PromptRecord]) -> PromptId {
    records
        .iter()
        .find(|r| r.source() == PromptSource::Ai)
        .map(|r| r.id())
        .unwrap()
}

#[tokio::test]
async fn test_queue_twice_yields_one_queued_record_with_stable_position() {
    let engine = engine();
    let records = generated(&engine, "ada").await;
    let id = PromptRef::Id(first_ai_id(&records));

    let first = engine.queue(&me("ada"), &teller("ada"), &id, PromptSource::Ai, None).unwrap();
    let second = engine.queue(&me("ada"), &teller("ada"), &id, PromptSource::Ai, None).unwrap();

    assert!(matches!(first, QueueOutcome::Queued(_)));
    assert_eq!(second.message(), "already queued");
    assert_eq!(first.record().queue_position(), Some(1));
    assert_eq!(second.record().queue_position(), Some(1));

    let queued: Vec<PromptRecord> = engine
        .list_prompts(&me("ada"), &teller("ada"))
        .unwrap()
        .into_iter()
        .filter(|r| r.status() == PromptStatus::Queued)
        .collect();
    assert_eq!(queued.len(), 1);
}

#[tokio::test]
async fn test_third_skip_retires_into_exactly_one_history_record() {
    let engine = engine();
    let records = generated(&engine, "ada").await;
    let id = first_ai_id(&records);

    for expected in 1..=2 {
        let resolved = engine.skip(&me("ada"), &teller("ada"), id, PromptSource::Ai).unwrap();
        match resolved.outcome {
            SkipOutcome::Counted(record) => assert_eq!(record.skip_count(), expected),
            other => panic!("expected counted skip, got {:?}", other),
        }
    }

    let resolved = engine.skip(&me("ada"), &teller("ada"), id, PromptSource::Ai).unwrap();
    let entry = match resolved.outcome {
        SkipOutcome::Retired(entry) => entry,
        other => panic!("expected retirement, got {:?}", other),
    };
    assert_eq!(entry.skip_count, 3);
    assert_eq!(entry.outcome, HistoryOutcome::Skipped);
    assert_ne!(resolved.next.map(|r| r.id()), Some(id));

    let history = engine.history(&me("ada"), &teller("ada")).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].original_prompt_id, id);
    assert!(engine
        .list_prompts(&me("ada"), &teller("ada"))
        .unwrap()
        .iter()
        .all(|r| r.id() != id));
    assert!(engine.skip(&me("ada"), &teller("ada"), id, PromptSource::Ai).is_err());
}

#[tokio::test]
async fn test_dismiss_keeps_skip_count_and_writes_no_history() {
    let engine = engine();
    let records = generated(&engine, "ada").await;
    let id = first_ai_id(&records);

    engine.skip(&me("ada"), &teller("ada"), id, PromptSource::Ai).unwrap();
    let resolved = engine
        .dismiss(&me("ada"), &teller("ada"), &PromptRef::Id(id), PromptSource::Ai, None)
        .unwrap();
    let record = match resolved.outcome {
        DismissOutcome::Dismissed(record) => record,
        other => panic!("expected dismissal, got {:?}", other),
    };
    assert_eq!(record.skip_count(), 1);
    assert_eq!(record.status(), PromptStatus::Dismissed);
    assert!(engine.history(&me("ada"), &teller("ada")).unwrap().is_empty());

    let again = engine
        .dismiss(&me("ada"), &teller("ada"), &PromptRef::Id(id), PromptSource::Ai, None)
        .unwrap();
    assert_eq!(again.outcome.message(), "already archived");
}

#[test]
fn test_catalog_dismiss_then_queue_round_trip() {
    let engine = engine();
    let text = PromptRef::Text("Who taught you to drive, and where?".to_string());

    engine
        .dismiss(&me("ada"), &teller("ada"), &text, PromptSource::Catalog, Some("firsts"))
        .unwrap();
    assert_eq!(engine.list_archive(&me("ada"), &teller("ada")).unwrap().len(), 1);

    let outcome = engine
        .queue(&me("ada"), &teller("ada"), &text, PromptSource::Catalog, None)
        .unwrap();
    assert!(matches!(outcome, QueueOutcome::Queued(_)));
    assert_eq!(outcome.record().status(), PromptStatus::Queued);
    assert!(outcome.record().queue_position().unwrap() >= 1);

    assert!(engine.list_archive(&me("ada"), &teller("ada")).unwrap().is_empty());
    let catalog: Vec<PromptRecord> = engine
        .list_prompts(&me("ada"), &teller("ada"))
        .unwrap()
        .into_iter()
        .filter(|r| r.source() == PromptSource::Catalog)
        .collect();
    assert_eq!(catalog.len(), 1);
}

#[tokio::test]
async fn test_archive_lists_dismissed_records_from_both_sources() {
    let engine = engine();
    let records = generated(&engine, "ada").await;
    let id = first_ai_id(&records);
    engine
        .dismiss(&me("ada"), &teller("ada"), &PromptRef::Id(id), PromptSource::Ai, None)
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    engine
        .dismiss(
            &me("ada"),
            &teller("ada"),
            &PromptRef::Text("What song takes you straight back to 1965?".to_string()),
            PromptSource::Catalog,
            None,
        )
        .unwrap();

    let archive = engine.list_archive(&me("ada"), &teller("ada")).unwrap();
    assert_eq!(archive.len(), 2);
    assert!(archive.iter().all(|r| r.status() == PromptStatus::Dismissed));
    // Most recently dismissed first
    assert_eq!(archive[0].source(), PromptSource::Catalog);
}

#[tokio::test]
async fn test_next_prompt_is_best_score_and_records_shown() {
    let engine = engine();
    let records = generated(&engine, "ada").await;
    let best = records
        .iter()
        .max_by(|a, b| {
            a.rank_score(50)
                .cmp(&b.rank_score(50))
                .then_with(|| b.created_at().cmp(&a.created_at()))
                .then_with(|| b.id().cmp(&a.id()))
        })
        .unwrap()
        .id();

    let next = engine.get_next(&me("ada"), &teller("ada")).unwrap();
    assert_eq!(next.prompt.as_ref().map(|r| r.id()), Some(best));
    assert!(next.family.is_empty());

    match engine.lifecycle().get(&teller("ada"), best, PromptSource::Ai).unwrap() {
        Some(PromptRecord::Ai(prompt)) => {
            assert_eq!(prompt.shown_count, 1);
            assert!(prompt.last_shown_at.is_some());
        }
        other => panic!("expected ai record, got {:?}", other),
    }
}

#[test]
fn test_family_prompts_ride_alongside_next() {
    let engine = engine();
    let submitted = engine
        .submit_family_prompt(&me("ada"), &teller("ada"), "What was Grandpa like at twenty?")
        .unwrap();

    let next = engine.get_next(&me("ada"), &teller("ada")).unwrap();
    assert!(next.prompt.is_none());
    assert_eq!(next.family.len(), 1);
    assert_eq!(next.family[0].id, submitted.id);

    engine
        .answer_family_prompt(&me("ada"), &teller("ada"), submitted.id, Some(StoryId::from("s7")))
        .unwrap();
    assert!(engine.get_next(&me("ada"), &teller("ada")).unwrap().family.is_empty());
}

#[test]
fn test_delete_removes_catalog_record_without_history() {
    let engine = engine();
    let text = PromptRef::Text("What did your first paycheck buy?".to_string());
    engine
        .dismiss(&me("ada"), &teller("ada"), &text, PromptSource::Catalog, None)
        .unwrap();

    let removed = engine
        .delete(&me("ada"), &teller("ada"), &text, PromptSource::Catalog)
        .unwrap();
    assert_eq!(removed.source(), PromptSource::Catalog);
    assert!(engine.list_archive(&me("ada"), &teller("ada")).unwrap().is_empty());
    assert!(engine.history(&me("ada"), &teller("ada")).unwrap().is_empty());
}
