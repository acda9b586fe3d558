//! Delegated access checks on every storyteller-scoped operation

use super::test_utils::{engine, engine_with, me, story, teller, DULUTH};
use storyprompt::config::EngineConfig;
use storyprompt::queue::PromptRef;
use storyprompt::types::{PrincipalId, PromptSource};
use storyprompt::{EngineError, GenerateRequest, TierSelection};

fn delegated_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config
        .access
        .delegations
        .insert("ada".to_string(), vec!["bob".to_string()]);
    config
}

fn assert_denied<T: std::fmt::Debug>(result: Result<T, EngineError>) {
    match result {
        Err(EngineError::AccessDenied { principal, storyteller }) => {
            assert_eq!(principal, PrincipalId::from("eve"));
            assert_eq!(storyteller, teller("ada"));
        }
        other => panic!("expected access denied, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delegate_acts_for_storyteller() {
    let engine = engine_with(delegated_config(), None);
    let bob = PrincipalId::from("bob");

    engine.add_story(&bob, story("ada", "s1", DULUTH, 0)).unwrap();
    let report = engine
        .generate(
            &bob,
            GenerateRequest {
                storyteller_id: teller("ada"),
                story_ids: Vec::new(),
                tier: TierSelection::Template,
            },
        )
        .await
        .unwrap();
    assert!(report.tier1.persisted > 0);

    let next = engine.get_next(&bob, &teller("ada")).unwrap();
    let prompt = next.prompt.unwrap();
    engine
        .queue(&bob, &teller("ada"), &PromptRef::Id(prompt.id()), PromptSource::Ai, None)
        .unwrap();

    let family = engine
        .submit_family_prompt(&bob, &teller("ada"), "What did Marcus sing on long drives?")
        .unwrap();
    assert_eq!(family.submitted_by, bob);
}

#[tokio::test]
async fn test_stranger_is_denied_and_nothing_changes() {
    let engine = engine_with(delegated_config(), None);
    let eve = PrincipalId::from("eve");
    engine.add_story(&me("ada"), story("ada", "s1", DULUTH, 0)).unwrap();

    assert_denied(
        engine
            .generate(
                &eve,
                GenerateRequest {
                    storyteller_id: teller("ada"),
                    story_ids: Vec::new(),
                    tier: TierSelection::All,
                },
            )
            .await,
    );
    assert_denied(engine.queue(
        &eve,
        &teller("ada"),
        &PromptRef::Text("What did your first paycheck buy?".to_string()),
        PromptSource::Catalog,
        None,
    ));
    assert_denied(engine.submit_family_prompt(&eve, &teller("ada"), "Where is the Buick now?"));
    assert_denied(engine.get_next(&eve, &teller("ada")));
    assert_denied(engine.add_story(&eve, story("ada", "s2", DULUTH, 1)));

    assert!(engine.list_prompts(&me("ada"), &teller("ada")).unwrap().is_empty());
    assert!(engine.family_prompts(&me("ada"), &teller("ada"), None).unwrap().is_empty());
    assert_eq!(engine.stories(&me("ada"), &teller("ada")).unwrap().len(), 1);
    assert!(engine.outbox_tasks().unwrap().is_empty());
}

#[test]
fn test_delegation_does_not_extend_to_other_storytellers() {
    let engine = engine_with(delegated_config(), None);
    let result = engine.list_archive(&PrincipalId::from("bob"), &teller("cyd"));
    assert!(matches!(result, Err(EngineError::AccessDenied { .. })));
}

#[test]
fn test_storyteller_without_delegations_acts_alone() {
    let engine = engine();
    assert!(engine.history(&me("ada"), &teller("ada")).unwrap().is_empty());
    assert!(engine.history(&me("bob"), &teller("ada")).is_err());
}

#[tokio::test]
async fn test_ids_with_nul_bytes_cannot_reach_another_storyteller() {
    let engine = engine();
    let crafted = "ada\0x";

    let added = engine.add_story(&me(crafted), story(crafted, "s1", DULUTH, 0));
    assert!(matches!(added, Err(EngineError::Validation(_))), "{:?}", added);

    let generated = engine
        .generate(
            &me(crafted),
            GenerateRequest {
                storyteller_id: teller(crafted),
                story_ids: Vec::new(),
                tier: TierSelection::Template,
            },
        )
        .await;
    assert!(matches!(generated, Err(EngineError::Validation(_))));
    assert!(matches!(
        engine.list_prompts(&me(crafted), &teller(crafted)),
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine.stories(&me(""), &teller("")),
        Err(EngineError::Validation(_))
    ));

    assert!(engine.list_prompts(&me("ada"), &teller("ada")).unwrap().is_empty());
    assert!(engine.stories(&me("ada"), &teller("ada")).unwrap().is_empty());
}

#[test]
fn test_story_ids_with_nul_bytes_are_rejected() {
    let engine = engine();
    let result = engine.add_story(&me("ada"), story("ada", "s1\0ghost", DULUTH, 0));
    assert!(matches!(result, Err(EngineError::Validation(_))));
    assert!(engine.stories(&me("ada"), &teller("ada")).unwrap().is_empty());
}
