//! CLI route table end to end, JSON output

use clap::Parser;
use serde_json::Value;
use storyprompt::cli::{exit_code, Cli, RunContext};
use tempfile::TempDir;

fn context(workspace: &TempDir, principal: Option<&str>) -> RunContext {
    RunContext::new(
        workspace.path().to_path_buf(),
        None,
        principal.map(str::to_string),
        "json".to_string(),
    )
    .unwrap()
}

fn run(ctx: &RunContext, args: &[&str]) -> Value {
    let mut argv = vec!["storyprompt"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    let output = ctx.execute(&cli.command).unwrap();
    serde_json::from_str(&output).unwrap()
}

#[test]
fn test_init_writes_config_once() {
    let workspace = TempDir::new().unwrap();
    let ctx = context(&workspace, None);

    let first = run(&ctx, &["init"]);
    assert_eq!(first["config_written"], Value::Bool(true));
    assert!(workspace.path().join("config").join("config.toml").exists());

    let second = run(&ctx, &["init"]);
    assert_eq!(second["config_written"], Value::Bool(false));

    let forced = run(&ctx, &["init", "--force"]);
    assert_eq!(forced["overwritten"], Value::Bool(true));
}

#[test]
fn test_story_add_generates_and_next_returns_a_prompt() {
    let workspace = TempDir::new().unwrap();
    let ctx = context(&workspace, None);

    let added = run(
        &ctx,
        &[
            "story",
            "add",
            "ada",
            "s1",
            "--transcript",
            "Marcus drove us to Duluth in his Buick.",
        ],
    );
    assert_eq!(added["story"]["id"], "s1");
    assert!(added["generation"]["tier1"]["persisted"].as_u64().unwrap() > 0);

    let next = run(&ctx, &["next", "ada"]);
    assert!(next["prompt"].is_object());

    let id = next["prompt"]["id"].as_u64().unwrap().to_string();
    let queued = run(&ctx, &["queue", "ada", &id]);
    assert_eq!(queued["result"], "queued");
}

#[test]
fn test_gate_check_reports_failures() {
    let workspace = TempDir::new().unwrap();
    let ctx = context(&workspace, None);

    let report = run(
        &ctx,
        &["gate", "check", "Tell me more about your childhood in the old house?"],
    );
    assert_eq!(report["valid"], Value::Bool(false));
}

#[test]
fn test_acting_as_a_stranger_maps_to_denied_exit_code() {
    let workspace = TempDir::new().unwrap();
    let ctx = context(&workspace, Some("eve"));

    let cli = Cli::try_parse_from(["storyprompt", "next", "ada"]).unwrap();
    let err = ctx.execute(&cli.command).unwrap_err();
    assert_eq!(exit_code(&err), 4);
}
