//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to the engine.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::{exit_code, map_error};
pub use parse::{
    CatalogCommands, Cli, Commands, FamilyCommands, GateCommands, OutboxCommands, StoryCommands,
};
pub use route::{load_config, RunContext};
