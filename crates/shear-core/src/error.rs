//! Error types for split operations.

use thiserror::Error;

/// Result type alias for split operations.
pub type SplitResult<T> = Result<T, SplitError>;

/// Errors that can occur while splitting a report document.
///
/// Only [`SplitError::Document`] aborts a run. Page-scoped failures are
/// absorbed by the hybrid resolver into an unresolved classification and
/// surface here solely so they stay distinguishable in logs.
#[derive(Error, Debug)]
pub enum SplitError {
    /// The source document could not be opened or decoded. Fatal to the run.
    #[error("Document error: {0}")]
    Document(String),

    /// A single page could not be decoded or read.
    #[error("Page {page} error: {reason}")]
    Page { page: usize, reason: String },

    /// Rasterizing a page header failed.
    #[error("Render error on page {page}: {reason}")]
    Render { page: usize, reason: String },

    /// The AI fallback classifier failed after exhausting its retry budget.
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Building the output archive failed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
