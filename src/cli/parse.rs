//! CLI parse: clap types for storyprompt. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// storyprompt - conversation prompt lifecycle for storytellers
#[derive(Parser)]
#[command(name = "storyprompt")]
#[command(about = "Generate, gate and queue conversation prompts for storytellers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (replaces the file layers of config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Acting principal (defaults to the storyteller named by the command)
    #[arg(long = "as", global = true)]
    pub principal: Option<String>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: String,

    /// Log at debug level
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Disable logging
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config/config.toml and create the store
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Record and list stories
    Story {
        #[command(subcommand)]
        command: StoryCommands,
    },
    /// Generate prompts from stories
    Generate {
        storyteller: String,
        /// Story ids to run Tier 1 over (default: all stories)
        #[arg(long = "story")]
        stories: Vec<String>,
        /// tier1, tier3 or all
        #[arg(long, default_value = "all")]
        tier: String,
    },
    /// Show the next prompt and pending family prompts
    Next { storyteller: String },
    /// List every live prompt
    Prompts { storyteller: String },
    /// Queue a prompt by id, or a catalog prompt by text
    Queue {
        storyteller: String,
        prompt: String,
        /// ai or catalog
        #[arg(long, default_value = "ai")]
        source: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Dismiss a prompt by id, or a catalog prompt by text
    Dismiss {
        storyteller: String,
        prompt: String,
        #[arg(long, default_value = "ai")]
        source: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Skip a prompt; the third skip retires it to history
    Skip {
        storyteller: String,
        id: u64,
        #[arg(long, default_value = "ai")]
        source: String,
    },
    /// Delete a prompt without writing history
    Delete {
        storyteller: String,
        prompt: String,
        #[arg(long, default_value = "catalog")]
        source: String,
    },
    /// List dismissed prompts
    Archive { storyteller: String },
    /// List retired prompts
    History { storyteller: String },
    /// List character insights from milestone analysis
    Insights { storyteller: String },
    /// Family-submitted prompts
    Family {
        #[command(subcommand)]
        command: FamilyCommands,
    },
    /// Built-in prompt catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// Quality gate diagnostics
    Gate {
        #[command(subcommand)]
        command: GateCommands,
    },
    /// After-commit notification tasks
    Outbox {
        #[command(subcommand)]
        command: OutboxCommands,
    },
}

#[derive(Subcommand)]
pub enum StoryCommands {
    /// Record a story and generate prompts for it
    Add {
        storyteller: String,
        id: String,
        /// Transcript text (or use --file)
        #[arg(long, conflicts_with = "file")]
        transcript: Option<String>,
        /// Read the transcript from a file
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        /// Exclude from generation and milestone counts
        #[arg(long)]
        private: bool,
        /// Record only; do not generate
        #[arg(long)]
        no_generate: bool,
    },
    /// List a storyteller's stories
    List { storyteller: String },
}

#[derive(Subcommand)]
pub enum FamilyCommands {
    /// Submit a prompt for a storyteller
    Submit { storyteller: String, text: String },
    /// Mark a pending prompt answered
    Answer {
        storyteller: String,
        id: u64,
        /// Story that answered it
        #[arg(long)]
        story: Option<String>,
    },
    /// Archive a prompt
    Archive { storyteller: String, id: u64 },
    /// List prompts, optionally by status (pending, answered, archived)
    List {
        storyteller: String,
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List catalog prompts
    List {
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum GateCommands {
    /// Run the quality gate over a text
    Check { text: String },
}

#[derive(Subcommand)]
pub enum OutboxCommands {
    /// List pending and dead-lettered tasks
    List,
    /// Attempt delivery of every pending task
    Dispatch,
}
