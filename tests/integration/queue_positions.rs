//! Queue position allocation under interleaving and concurrency

use super::test_utils::{engine, me, story, teller, DULUTH};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use storyprompt::queue::PromptRef;
use storyprompt::types::{PromptSource, StoryId};
use storyprompt::{GenerateRequest, TierSelection};

#[test]
fn test_positions_increase_per_storyteller_and_stay_isolated() {
    let engine = engine();
    let store = engine.store();

    let mut ada = Vec::new();
    let mut bea = Vec::new();
    for _ in 0..4 {
        ada.push(store.next_queue_position(&teller("ada")).unwrap());
        bea.push(store.next_queue_position(&teller("bea")).unwrap());
    }

    assert_eq!(ada, vec![1, 2, 3, 4]);
    assert_eq!(bea, vec![1, 2, 3, 4]);
    assert_eq!(store.current_queue_position(&teller("ada")).unwrap(), 4);
    assert_eq!(store.current_queue_position(&teller("cyd")).unwrap(), 0);
}

#[test]
fn test_concurrent_allocation_hands_out_each_position_once() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let engine = engine();
    let store = Arc::new(engine.store().clone());
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..PER_THREAD)
                    .map(|_| store.next_queue_position(&teller("ada")).unwrap())
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut seen = BTreeSet::new();
    for handle in handles {
        for position in handle.join().unwrap() {
            assert!(seen.insert(position), "position {} handed out twice", position);
        }
    }
    let total = (THREADS * PER_THREAD) as u64;
    assert_eq!(seen, (1..=total).collect::<BTreeSet<u64>>());
}

#[test]
fn test_concurrent_queue_calls_get_distinct_positions() {
    const TEXTS: &[&str] = &[
        "Who taught you to drive, and where?",
        "What did your first paycheck buy?",
        "What song takes you straight back to 1965?",
        "Which coach changed your mind about something important?",
        "What did your grandmother cook on Sundays?",
        "Where did you go on your first date?",
    ];

    let engine = Arc::new(engine());
    let handles: Vec<_> = TEXTS
        .iter()
        .map(|text| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                engine
                    .queue(
                        &me("ada"),
                        &teller("ada"),
                        &PromptRef::Text(text.to_string()),
                        PromptSource::Catalog,
                        None,
                    )
                    .unwrap()
                    .record()
                    .queue_position()
                    .unwrap()
            })
        })
        .collect();

    let positions: BTreeSet<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(positions, (1..=TEXTS.len() as u64).collect::<BTreeSet<u64>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_tier1_runs_on_one_story_persist_each_anchor_once() {
    let engine = engine();
    engine.add_story(&me("ada"), story("ada", "s1", DULUTH, 0)).unwrap();

    let report = engine
        .generate(
            &me("ada"),
            GenerateRequest {
                storyteller_id: teller("ada"),
                story_ids: vec![StoryId::from("s1"); 8],
                tier: TierSelection::Template,
            },
        )
        .await
        .unwrap();

    assert_eq!(report.failed_stories, 0);
    assert_eq!(report.tier1.persisted, 3);
    assert_eq!(report.tier1.duplicates, 21);
    assert_eq!(engine.list_prompts(&me("ada"), &teller("ada")).unwrap().len(), 3);
}
