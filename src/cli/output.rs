//! CLI output: error mapping from domain errors to stable CLI surface.

/// Map command errors to a string for CLI output, including the cause chain.
pub fn map_error(e: &anyhow::Error) -> String {
    format!("Error: {:#}", e)
}
