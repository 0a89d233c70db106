//! Error types for patchbot
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in patchbot
#[derive(Debug, Error)]
pub enum PatchbotError {
    /// Fetching or parsing candidate tickets from the tracker failed
    #[error("Tracker error: {0}")]
    Tracker(String),

    /// Posting a report to the server failed
    #[error("Report transport error: {0}")]
    Report(String),

    /// Configuration file or value error
    #[error("Config error: {0}")]
    Config(String),

    /// Unknown plugin identifier or plugin resolution failure
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// Pipeline setup or stage execution error
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Working-copy or log directory error
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for patchbot operations
pub type Result<T> = std::result::Result<T, PatchbotError>;
