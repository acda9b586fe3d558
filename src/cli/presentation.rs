//! CLI presentation: text and json formatters per command family.

mod family;
mod gate;
mod generate;
mod init;
mod prompt;
mod shared;

pub use family::{format_family_list, format_family_prompt};
pub use gate::{format_catalog_entries, format_quality_report};
pub use generate::{format_generate_report, format_story_added, format_story_list};
pub use init::{format_dispatch_report, format_init_summary, format_outbox_tasks, InitSummary};
pub use prompt::{
    format_deleted, format_dismiss, format_history, format_insights, format_next,
    format_prompt_list, format_queue_outcome, format_skip,
};
