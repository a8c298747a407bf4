//! Generation Provider Trait
//!
//! Defines the seam between the tagging engine and the generation service.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::core::CoreResult;

/// Trait for text/vision generation providers
///
/// Implementations perform network calls only; they never persist anything.
/// Failures map to `CoreError::Upstream` (non-success response, malformed
/// body) or `CoreError::Timeout`.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the provider name
    fn name(&self) -> &str;

    /// Generates a completion from a text prompt
    async fn generate(&self, prompt: &str) -> CoreResult<String>;

    /// Generates a completion from a prompt plus supporting images.
    ///
    /// Images that do not exist on disk are skipped, not treated as failure;
    /// with zero readable images this degrades to a text-only call.
    async fn generate_with_media(&self, prompt: &str, media: &[PathBuf]) -> CoreResult<String>;

    /// Performs a lightweight connectivity check.
    ///
    /// Cheap by contract: no completions, and no secrets in error messages.
    async fn health_check(&self) -> CoreResult<()> {
        Ok(())
    }
}
