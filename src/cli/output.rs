//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::EngineError;

/// Map engine errors to a string for CLI output, prefixed by a stable category.
pub fn map_error(e: &EngineError) -> String {
    let category = match e {
        EngineError::Validation(_) => "invalid",
        EngineError::NotFound(_) => "not found",
        EngineError::AccessDenied { .. } => "denied",
        EngineError::Persistence(_) => "storage",
        EngineError::GenerationProvider(_) => "provider",
        EngineError::Config(_) => "config",
    };
    format!("error ({}): {}", category, e)
}

/// Process exit code per error category
pub fn exit_code(e: &EngineError) -> i32 {
    match e {
        EngineError::Validation(_) | EngineError::Config(_) => 2,
        EngineError::NotFound(_) => 3,
        EngineError::AccessDenied { .. } => 4,
        EngineError::Persistence(_) | EngineError::GenerationProvider(_) => 1,
    }
}
