//! CLI route: single route table and run context. Dispatches to the engine and presentation.

use crate::api::{GenerateRequest, PromptEngine, TierSelection};
use crate::cli::help::{command_name, is_unscoped};
use crate::cli::parse::{
    CatalogCommands, Commands, FamilyCommands, GateCommands, OutboxCommands, StoryCommands,
};
use crate::cli::presentation::{
    format_catalog_entries, format_deleted, format_dismiss, format_dispatch_report,
    format_family_list, format_family_prompt, format_generate_report, format_history,
    format_init_summary, format_insights, format_next, format_outbox_tasks, format_prompt_list,
    format_queue_outcome, format_quality_report, format_skip, format_story_added,
    format_story_list, InitSummary,
};
use crate::config::{ConfigLoader, EngineConfig};
use crate::error::EngineError;
use crate::outbox::LogNotifier;
use crate::quality;
use crate::queue::PromptRef;
use crate::store::FamilyPromptStatus;
use crate::story::Story;
use crate::types::{now, PrincipalId, PromptId, PromptSource, StoryId, StorytellerId};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace, loaded config and the engine.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    engine: PromptEngine,
    config: EngineConfig,
    workspace_root: PathBuf,
    principal: Option<PrincipalId>,
    format: String,
    runtime: Runtime,
}

impl RunContext {
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        principal: Option<String>,
        format: String,
    ) -> Result<Self, EngineError> {
        let config = load_config(&workspace_root, config_path.as_deref())?;
        let engine = PromptEngine::from_config(config.clone(), &workspace_root)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to create runtime: {}", e)))?;
        Ok(Self {
            engine,
            config,
            workspace_root,
            principal: principal.map(PrincipalId::new),
            format,
            runtime,
        })
    }

    pub fn engine(&self) -> &PromptEngine {
        &self.engine
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, EngineError> {
        let name = command_name(command);
        if self.principal.is_some() && is_unscoped(command) {
            debug!(command = %name, "--as ignored for unscoped command");
        }
        let started = Instant::now();
        let result = self.execute_inner(command);
        info!(
            command = %name,
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, EngineError> {
        let format = self.format.as_str();
        match command {
            Commands::Init { force } => self.handle_init(*force),
            Commands::Story { command } => self.handle_story(command),
            Commands::Generate {
                storyteller,
                stories,
                tier,
            } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let request = GenerateRequest {
                    storyteller_id: storyteller.clone(),
                    story_ids: stories.iter().cloned().map(StoryId::new).collect(),
                    tier: tier.parse::<TierSelection>()?,
                };
                let principal = self.principal_for(&storyteller);
                let report = self.runtime.block_on(self.engine.generate(&principal, request))?;
                format_generate_report(&report, format)
            }
            Commands::Next { storyteller } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let next = self.engine.get_next(&self.principal_for(&storyteller), &storyteller)?;
                format_next(&next, format)
            }
            Commands::Prompts { storyteller } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let records = self
                    .engine
                    .list_prompts(&self.principal_for(&storyteller), &storyteller)?;
                format_prompt_list(&records, format, "No prompts.")
            }
            Commands::Queue {
                storyteller,
                prompt,
                source,
                category,
            } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let source = parse_source(source)?;
                let outcome = self.engine.queue(
                    &self.principal_for(&storyteller),
                    &storyteller,
                    &parse_prompt_ref(prompt, source)?,
                    source,
                    category.as_deref(),
                )?;
                format_queue_outcome(&outcome, format)
            }
            Commands::Dismiss {
                storyteller,
                prompt,
                source,
                category,
            } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let source = parse_source(source)?;
                let resolved = self.engine.dismiss(
                    &self.principal_for(&storyteller),
                    &storyteller,
                    &parse_prompt_ref(prompt, source)?,
                    source,
                    category.as_deref(),
                )?;
                format_dismiss(&resolved, format)
            }
            Commands::Skip {
                storyteller,
                id,
                source,
            } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let resolved = self.engine.skip(
                    &self.principal_for(&storyteller),
                    &storyteller,
                    PromptId(*id),
                    parse_source(source)?,
                )?;
                format_skip(&resolved, format)
            }
            Commands::Delete {
                storyteller,
                prompt,
                source,
            } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let source = parse_source(source)?;
                let removed = self.engine.delete(
                    &self.principal_for(&storyteller),
                    &storyteller,
                    &parse_prompt_ref(prompt, source)?,
                    source,
                )?;
                format_deleted(&removed, format)
            }
            Commands::Archive { storyteller } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let records = self
                    .engine
                    .list_archive(&self.principal_for(&storyteller), &storyteller)?;
                format_prompt_list(&records, format, "Archive is empty.")
            }
            Commands::History { storyteller } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let entries = self
                    .engine
                    .history(&self.principal_for(&storyteller), &storyteller)?;
                format_history(&entries, format)
            }
            Commands::Insights { storyteller } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let insights = self
                    .engine
                    .insights(&self.principal_for(&storyteller), &storyteller)?;
                format_insights(&insights, format)
            }
            Commands::Family { command } => self.handle_family(command),
            Commands::Catalog { command } => match command {
                CatalogCommands::List { category } => {
                    format_catalog_entries(&self.engine.catalog_entries(category.as_deref()), format)
                }
            },
            Commands::Gate { command } => match command {
                GateCommands::Check { text } => format_quality_report(text, &quality::report(text), format),
            },
            Commands::Outbox { command } => match command {
                OutboxCommands::List => format_outbox_tasks(&self.engine.outbox_tasks()?, format),
                OutboxCommands::Dispatch => {
                    let report = self.runtime.block_on(self.engine.dispatch_outbox(&LogNotifier))?;
                    format_dispatch_report(&report, format)
                }
            },
        }
    }

    fn handle_init(&self, force: bool) -> Result<String, EngineError> {
        let config_path = ConfigLoader::workspace_config_path(&self.workspace_root);
        let exists = config_path.exists();
        let config_written = !exists || force;
        if config_written {
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EngineError::Config(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
            std::fs::write(&config_path, EngineConfig::default_toml()?).map_err(|e| {
                EngineError::Config(format!("Failed to write {}: {}", config_path.display(), e))
            })?;
            info!(path = %config_path.display(), overwritten = exists, "Wrote default config");
        }
        self.engine.store().flush()?;
        let summary = InitSummary {
            config_path,
            config_written,
            overwritten: exists && force,
            store_path: self.config.storage.resolve(&self.workspace_root),
        };
        format_init_summary(&summary, &self.format)
    }

    fn handle_story(&self, command: &StoryCommands) -> Result<String, EngineError> {
        match command {
            StoryCommands::Add {
                storyteller,
                id,
                transcript,
                file,
                title,
                year,
                private,
                no_generate,
            } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let principal = self.principal_for(&storyteller);
                let story = self.engine.add_story(
                    &principal,
                    Story {
                        id: StoryId::new(id.clone()),
                        storyteller_id: storyteller.clone(),
                        title: title.clone(),
                        transcript: read_transcript(transcript.as_deref(), file.as_deref())?,
                        year: *year,
                        is_private: *private,
                        created_at: now(),
                    },
                )?;
                let report = if *no_generate {
                    None
                } else {
                    let request = GenerateRequest {
                        storyteller_id: storyteller,
                        story_ids: vec![story.id.clone()],
                        tier: TierSelection::All,
                    };
                    Some(self.runtime.block_on(self.engine.generate(&principal, request))?)
                };
                format_story_added(&story, report.as_ref(), &self.format)
            }
            StoryCommands::List { storyteller } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let stories = self
                    .engine
                    .stories(&self.principal_for(&storyteller), &storyteller)?;
                format_story_list(&stories, &self.format)
            }
        }
    }

    fn handle_family(&self, command: &FamilyCommands) -> Result<String, EngineError> {
        let format = self.format.as_str();
        match command {
            FamilyCommands::Submit { storyteller, text } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let prompt =
                    self.engine
                        .submit_family_prompt(&self.principal_for(&storyteller), &storyteller, text)?;
                format_family_prompt(&prompt, format)
            }
            FamilyCommands::Answer {
                storyteller,
                id,
                story,
            } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let prompt = self.engine.answer_family_prompt(
                    &self.principal_for(&storyteller),
                    &storyteller,
                    PromptId(*id),
                    story.clone().map(StoryId::new),
                )?;
                format_family_prompt(&prompt, format)
            }
            FamilyCommands::Archive { storyteller, id } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let prompt = self.engine.archive_family_prompt(
                    &self.principal_for(&storyteller),
                    &storyteller,
                    PromptId(*id),
                )?;
                format_family_prompt(&prompt, format)
            }
            FamilyCommands::List { storyteller, status } => {
                let storyteller = StorytellerId::new(storyteller.clone());
                let status = status.as_deref().map(parse_family_status).transpose()?;
                let prompts = self.engine.family_prompts(
                    &self.principal_for(&storyteller),
                    &storyteller,
                    status,
                )?;
                format_family_list(&prompts, format)
            }
        }
    }

    /// `--as`, or the storyteller acting for themselves
    fn principal_for(&self, storyteller: &StorytellerId) -> PrincipalId {
        self.principal
            .clone()
            .unwrap_or_else(|| PrincipalId::new(storyteller.as_str()))
    }
}

pub fn load_config(workspace_root: &Path, config_path: Option<&Path>) -> Result<EngineConfig, EngineError> {
    match config_path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(workspace_root),
    }
}

fn parse_source(raw: &str) -> Result<PromptSource, EngineError> {
    raw.parse::<PromptSource>().map_err(EngineError::Validation)
}

/// Numeric arguments are ids; anything else is catalog text
fn parse_prompt_ref(raw: &str, source: PromptSource) -> Result<PromptRef, EngineError> {
    if let Ok(id) = raw.parse::<PromptId>() {
        return Ok(PromptRef::Id(id));
    }
    match source {
        PromptSource::Catalog => Ok(PromptRef::Text(raw.to_string())),
        PromptSource::Ai => Err(EngineError::Validation(format!(
            "'{}' is not a prompt id; generated prompts are referenced by id",
            raw
        ))),
    }
}

fn parse_family_status(raw: &str) -> Result<FamilyPromptStatus, EngineError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pending" => Ok(FamilyPromptStatus::Pending),
        "answered" => Ok(FamilyPromptStatus::Answered),
        "archived" => Ok(FamilyPromptStatus::Archived),
        other => Err(EngineError::Validation(format!(
            "unknown family prompt status '{}' (expected pending, answered or archived)",
            other
        ))),
    }
}

fn read_transcript(transcript: Option<&str>, file: Option<&Path>) -> Result<String, EngineError> {
    match (transcript, file) {
        (Some(text), _) => Ok(text.to_string()),
        (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
            EngineError::Validation(format!("cannot read transcript {}: {}", path.display(), e))
        }),
        (None, None) => Err(EngineError::Validation(
            "a transcript is required (--transcript or --file)".to_string(),
        )),
    }
}
