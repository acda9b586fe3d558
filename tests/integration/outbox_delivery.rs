//! After-commit notifications and their delivery

use super::test_utils::{add_stories, engine, engine_with, me, teller, RecordingNotifier};
use storyprompt::config::EngineConfig;
use storyprompt::outbox::{OutboxEvent, TaskStatus};
use storyprompt::{GenerateRequest, TierSelection};

fn template_request() -> GenerateRequest {
    GenerateRequest {
        storyteller_id: teller("ada"),
        story_ids: Vec::new(),
        tier: TierSelection::Template,
    }
}

#[tokio::test]
async fn test_generation_and_family_submissions_enqueue_notifications() {
    let engine = engine();
    add_stories(&engine, "ada", 0, 1);
    let report = engine.generate(&me("ada"), template_request()).await.unwrap();
    engine
        .submit_family_prompt(&me("ada"), &teller("ada"), "Where did Marcus learn to drive?")
        .unwrap();

    let tasks = engine.outbox_tasks().unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending && t.attempts == 0));
    assert!(tasks.iter().any(|t| t.event
        == OutboxEvent::PromptsGenerated {
            storyteller_id: teller("ada"),
            persisted: report.persisted(),
        }));
    assert!(tasks
        .iter()
        .any(|t| t.event.kind() == "family_prompt_submitted"));
}

#[tokio::test]
async fn test_generation_with_nothing_new_sends_nothing() {
    let engine = engine();
    add_stories(&engine, "ada", 0, 1);
    engine.generate(&me("ada"), template_request()).await.unwrap();
    let before = engine.outbox_tasks().unwrap().len();

    let again = engine.generate(&me("ada"), template_request()).await.unwrap();
    assert_eq!(again.persisted(), 0);
    assert_eq!(engine.outbox_tasks().unwrap().len(), before);
}

#[tokio::test]
async fn test_dispatch_delivers_and_clears_tasks() {
    let engine = engine();
    add_stories(&engine, "ada", 0, 1);
    engine.generate(&me("ada"), template_request()).await.unwrap();

    let notifier = RecordingNotifier::default();
    let report = engine.dispatch_outbox(&notifier).await.unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(notifier.delivered().len(), 1);
    assert_eq!(notifier.delivered()[0].storyteller_id(), &teller("ada"));
    assert!(engine.outbox_tasks().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_delivery_dead_letters_after_attempt_budget() {
    let mut config = EngineConfig::default();
    config.outbox.max_attempts = 2;
    let engine = engine_with(config, None);
    engine
        .submit_family_prompt(&me("ada"), &teller("ada"), "Who fixed the Buick in 1962?")
        .unwrap();

    let notifier = RecordingNotifier::failing_first(10);
    let first = engine.dispatch_outbox(&notifier).await.unwrap();
    assert_eq!(first.retried, 1);
    let second = engine.dispatch_outbox(&notifier).await.unwrap();
    assert_eq!(second.dead_lettered, 1);

    let tasks = engine.outbox_tasks().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::DeadLettered);
    assert_eq!(tasks[0].attempts, 2);
    assert!(tasks[0].last_error.is_some());

    // Dead-lettered tasks are no longer attempted
    let third = engine.dispatch_outbox(&notifier).await.unwrap();
    assert_eq!(third.delivered + third.retried + third.dead_lettered, 0);
    assert!(notifier.delivered().is_empty());
}
