//! Tier 3 milestone triggering, failure isolation and timeouts

use super::test_utils::{add_stories, engine, engine_with, me, teller, ScriptedAnalyzer};
use std::sync::Arc;
use std::time::Duration;
use storyprompt::config::EngineConfig;
use storyprompt::generation::milestone::MilestoneOutcome;
use storyprompt::provider::StoryAnalyzer;
use storyprompt::types::{PromptSource, Tier};
use storyprompt::{GenerateRequest, ProviderError, TierSelection};

const MILESTONE_PROMPTS: &[&str] = &[
    "Why did Marcus keep the Buick after Duluth?",
    "Which winter in Duluth felt longest to you?",
];

fn request(storyteller: &str, tier: TierSelection) -> GenerateRequest {
    GenerateRequest {
        storyteller_id: teller(storyteller),
        story_ids: Vec::new(),
        tier,
    }
}

fn scripted(analyzer: ScriptedAnalyzer) -> (Arc<ScriptedAnalyzer>, Option<Arc<dyn StoryAnalyzer>>) {
    let analyzer = Arc::new(analyzer);
    let dynamic: Arc<dyn StoryAnalyzer> = analyzer.clone();
    (analyzer, Some(dynamic))
}

#[tokio::test]
async fn test_non_milestone_counts_never_call_the_provider() {
    let (analyzer, dynamic) = scripted(ScriptedAnalyzer::prompts(MILESTONE_PROMPTS));
    let engine = engine_with(EngineConfig::default(), dynamic);

    add_stories(&engine, "ada", 0, 5);
    let report = engine.generate(&me("ada"), request("ada", TierSelection::Milestone)).await.unwrap();
    assert_eq!(report.milestone, Some(MilestoneOutcome::NotMilestone { eligible: 5 }));

    add_stories(&engine, "ada", 5, 1);
    let report = engine.generate(&me("ada"), request("ada", TierSelection::Milestone)).await.unwrap();
    assert_eq!(report.milestone, Some(MilestoneOutcome::NotMilestone { eligible: 6 }));

    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn test_fiftieth_story_triggers_one_analysis() {
    let (analyzer, dynamic) = scripted(ScriptedAnalyzer::prompts(MILESTONE_PROMPTS));
    let engine = engine_with(EngineConfig::default(), dynamic);

    add_stories(&engine, "ada", 0, 50);
    let report = engine.generate(&me("ada"), request("ada", TierSelection::Milestone)).await.unwrap();

    match report.milestone {
        Some(MilestoneOutcome::Completed { milestone, counts, .. }) => {
            assert_eq!(milestone, 50);
            assert_eq!(counts.persisted, 2);
        }
        other => panic!("expected a completed milestone run, got {:?}", other),
    }
    assert_eq!(analyzer.calls(), 1);

    let tier3 = engine
        .list_prompts(&me("ada"), &teller("ada"))
        .unwrap()
        .into_iter()
        .filter(|r| r.source() == PromptSource::Ai)
        .filter(|r| matches!(r, storyprompt::lifecycle::PromptRecord::Ai(p) if p.tier == Tier::Milestone))
        .count();
    assert_eq!(tier3, 2);
}

#[tokio::test]
async fn test_repeated_requests_at_one_milestone_run_once() {
    let (analyzer, dynamic) = scripted(ScriptedAnalyzer::prompts(MILESTONE_PROMPTS));
    let engine = engine_with(EngineConfig::default(), dynamic);

    add_stories(&engine, "ada", 0, 3);
    engine.generate(&me("ada"), request("ada", TierSelection::Milestone)).await.unwrap();
    let again = engine.generate(&me("ada"), request("ada", TierSelection::Milestone)).await.unwrap();

    assert_eq!(again.milestone, Some(MilestoneOutcome::AlreadyClaimed { milestone: 3 }));
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_provider_failure_keeps_tier1_results() {
    let (analyzer, dynamic) = scripted(ScriptedAnalyzer::failing(ProviderError::RequestFailed(
        "503 Service Unavailable".to_string(),
    )));
    let engine = engine_with(EngineConfig::default(), dynamic);

    add_stories(&engine, "ada", 0, 1);
    let report = engine.generate(&me("ada"), request("ada", TierSelection::All)).await.unwrap();

    assert!(report.tier1.persisted > 0);
    assert_eq!(report.tier3.persisted, 0);
    assert!(matches!(
        report.milestone,
        Some(MilestoneOutcome::Failed { milestone: Some(1), .. })
    ));
    assert_eq!(analyzer.calls(), 1);

    // A failed run releases its claim so the same count may retry
    assert!(engine
        .store()
        .get_milestone_claim(&teller("ada"), 1)
        .unwrap()
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_slow_provider_times_out() {
    let mut config = EngineConfig::default();
    config.generation.milestone_timeout_secs = 5;
    let (_, dynamic) = scripted(
        ScriptedAnalyzer::prompts(MILESTONE_PROMPTS).slow(Duration::from_secs(600)),
    );
    let engine = engine_with(config, dynamic);

    add_stories(&engine, "ada", 0, 2);
    let report = engine.generate(&me("ada"), request("ada", TierSelection::Milestone)).await.unwrap();

    match &report.milestone {
        Some(MilestoneOutcome::Failed { milestone, reason }) => {
            assert_eq!(*milestone, Some(2));
            assert!(reason.contains("timed out"), "{}", reason);
        }
        other => panic!("expected a timed out run, got {:?}", other),
    }
    assert_eq!(report.persisted(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_at_one_milestone_call_the_provider_once() {
    let (analyzer, dynamic) = scripted(
        ScriptedAnalyzer::prompts(MILESTONE_PROMPTS).slow(Duration::from_millis(50)),
    );
    let engine = Arc::new(engine_with(EngineConfig::default(), dynamic));
    add_stories(&engine, "ada", 0, 3);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .generate(&me("ada"), request("ada", TierSelection::Milestone))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut completed = 0;
    for handle in handles {
        let report = handle.await.unwrap();
        match report.milestone {
            Some(MilestoneOutcome::Completed { milestone: 3, .. }) => completed += 1,
            Some(MilestoneOutcome::AlreadyClaimed { milestone: 3 }) => {}
            other => panic!("unexpected milestone outcome {:?}", other),
        }
    }

    assert_eq!(completed, 1);
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_insights_are_persisted_with_the_milestone() {
    let (_, dynamic) = scripted(
        ScriptedAnalyzer::prompts(MILESTONE_PROMPTS)
            .with_insight("theme", "Road trips with Marcus recur across stories"),
    );
    let engine = engine_with(EngineConfig::default(), dynamic);

    add_stories(&engine, "ada", 0, 1);
    engine.generate(&me("ada"), request("ada", TierSelection::Milestone)).await.unwrap();

    let insights = engine.insights(&me("ada"), &teller("ada")).unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].milestone, 1);
    assert_eq!(insights[0].insight_type, "theme");
}

#[tokio::test]
async fn test_milestone_is_disabled_without_a_provider() {
    let engine = engine();
    add_stories(&engine, "ada", 0, 1);

    let report = engine.generate(&me("ada"), request("ada", TierSelection::All)).await.unwrap();
    assert_eq!(report.milestone, Some(MilestoneOutcome::Disabled { milestone: 1 }));
    assert!(report.tier1.persisted > 0);
}

#[tokio::test]
async fn test_private_stories_do_not_count_toward_milestones() {
    let (analyzer, dynamic) = scripted(ScriptedAnalyzer::prompts(MILESTONE_PROMPTS));
    let engine = engine_with(EngineConfig::default(), dynamic);

    add_stories(&engine, "ada", 0, 4);
    let mut private = super::test_utils::story("ada", "hidden", super::test_utils::DULUTH, 10);
    private.is_private = true;
    engine.add_story(&me("ada"), private).unwrap();

    let report = engine.generate(&me("ada"), request("ada", TierSelection::Milestone)).await.unwrap();
    assert!(matches!(
        report.milestone,
        Some(MilestoneOutcome::Completed { milestone: 4, .. })
    ));
    assert_eq!(analyzer.calls(), 1);
}
