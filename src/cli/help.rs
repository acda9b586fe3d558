//! CLI help and command-name contract for logging and routing.

use crate::cli::parse::{
    CatalogCommands, Commands, FamilyCommands, GateCommands, OutboxCommands, StoryCommands,
};

/// Command name string for log events (e.g. "family.submit", "next").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Init { .. } => "init".to_string(),
        Commands::Story { command } => format!("story.{}", story_command_name(command)),
        Commands::Generate { .. } => "generate".to_string(),
        Commands::Next { .. } => "next".to_string(),
        Commands::Prompts { .. } => "prompts".to_string(),
        Commands::Queue { .. } => "queue".to_string(),
        Commands::Dismiss { .. } => "dismiss".to_string(),
        Commands::Skip { .. } => "skip".to_string(),
        Commands::Delete { .. } => "delete".to_string(),
        Commands::Archive { .. } => "archive".to_string(),
        Commands::History { .. } => "history".to_string(),
        Commands::Insights { .. } => "insights".to_string(),
        Commands::Family { command } => format!("family.{}", family_command_name(command)),
        Commands::Catalog { command } => format!("catalog.{}", catalog_command_name(command)),
        Commands::Gate { command } => format!("gate.{}", gate_command_name(command)),
        Commands::Outbox { command } => format!("outbox.{}", outbox_command_name(command)),
    }
}

pub fn story_command_name(command: &StoryCommands) -> &'static str {
    match command {
        StoryCommands::Add { .. } => "add",
        StoryCommands::List { .. } => "list",
    }
}

pub fn family_command_name(command: &FamilyCommands) -> &'static str {
    match command {
        FamilyCommands::Submit { .. } => "submit",
        FamilyCommands::Answer { .. } => "answer",
        FamilyCommands::Archive { .. } => "archive",
        FamilyCommands::List { .. } => "list",
    }
}

pub fn catalog_command_name(command: &CatalogCommands) -> &'static str {
    match command {
        CatalogCommands::List { .. } => "list",
    }
}

pub fn gate_command_name(command: &GateCommands) -> &'static str {
    match command {
        GateCommands::Check { .. } => "check",
    }
}

pub fn outbox_command_name(command: &OutboxCommands) -> &'static str {
    match command {
        OutboxCommands::List => "list",
        OutboxCommands::Dispatch => "dispatch",
    }
}

/// True for commands that name no storyteller and need no principal
pub fn is_unscoped(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Init { .. } | Commands::Catalog { .. } | Commands::Gate { .. } | Commands::Outbox { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_commands_are_dotted() {
        let command = Commands::Family {
            command: FamilyCommands::Submit {
                storyteller: "ada".to_string(),
                text: "Who taught you to swim?".to_string(),
            },
        };
        assert_eq!(command_name(&command), "family.submit");
        assert!(!is_unscoped(&command));
        assert!(is_unscoped(&Commands::Outbox {
            command: OutboxCommands::Dispatch
        }));
    }
}
