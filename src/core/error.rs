//! Reeltag Error Definitions
//!
//! Defines error types used throughout the engine.

use thiserror::Error;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Lookup Errors
    // =========================================================================
    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // =========================================================================
    // Upstream Service Errors
    // =========================================================================
    #[error("Generation request failed: {0}")]
    Upstream(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    // =========================================================================
    // Media Tool Errors
    // =========================================================================
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("FFprobe error: {0}")]
    Probe(String),

    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    #[error("Tagging pipeline failed: {0}")]
    Pipeline(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Database(e.to_string())
    }
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether this error aborts a tagging run.
    ///
    /// Upstream/extraction failures are degraded at their stage boundary;
    /// store failures always surface as a failed run.
    pub fn is_fatal_for_pipeline(&self) -> bool {
        matches!(
            self,
            CoreError::Database(_) | CoreError::Io(_) | CoreError::Internal(_)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
