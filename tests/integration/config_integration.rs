//! Configuration files feeding the engine

use std::fs;
use storyprompt::config::{ConfigLoader, EngineConfig};
use storyprompt::types::PrincipalId;
use storyprompt::{EngineError, PromptEngine};
use tempfile::TempDir;

use super::test_utils::{build_engine, teller};

const WORKSPACE_CONFIG: &str = r#"
[storage]
path = "data/prompts"

[generation]
tier1_expiry_days = 3
concurrency = 2
milestones = [1, 5, 25]

[queue]
catalog_score = 40

[access.delegations]
ada = ["bob"]
"#;

#[test]
fn test_explicit_file_sections_reach_the_engine() {
    let workspace = TempDir::new().unwrap();
    let path = workspace.path().join("storyprompt.toml");
    fs::write(&path, WORKSPACE_CONFIG).unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(config.generation.tier1_expiry_days, 3);
    assert_eq!(config.generation.concurrency, 2);
    assert_eq!(config.generation.milestones, vec![1, 5, 25]);
    assert_eq!(config.queue.catalog_score, 40);
    // Unset keys keep their defaults
    assert_eq!(config.generation.tier3_expiry_days, 30);
    assert!(config.provider.is_none());

    let engine = PromptEngine::from_config(config, workspace.path()).unwrap();
    assert!(workspace.path().join("data").join("prompts").exists());
    assert!(engine
        .history(&PrincipalId::from("bob"), &teller("ada"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_workspace_config_file_is_discovered() {
    let workspace = TempDir::new().unwrap();
    fs::create_dir_all(workspace.path().join("config")).unwrap();
    fs::write(
        ConfigLoader::workspace_config_path(workspace.path()),
        "[outbox]\nmax_attempts = 9\n",
    )
    .unwrap();

    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.outbox.max_attempts, 9);
}

#[test]
fn test_invalid_config_fails_engine_build() {
    let dir = TempDir::new().unwrap();
    let mut config = EngineConfig::default();
    config.generation.milestones = vec![10, 5];
    config.queue.catalog_score = 400;

    match build_engine(&dir, config, None) {
        Err(EngineError::Config(message)) => {
            assert!(message.contains("milestones"), "{}", message);
            assert!(message.contains("catalog_score"), "{}", message);
        }
        Err(other) => panic!("expected a config error, got {}", other),
        Ok(_) => panic!("invalid config was accepted"),
    }
}

#[test]
fn test_default_toml_loads_back_as_defaults() {
    let workspace = TempDir::new().unwrap();
    let path = workspace.path().join("config.toml");
    fs::write(&path, EngineConfig::default_toml().unwrap()).unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(config, EngineConfig::default());
}
