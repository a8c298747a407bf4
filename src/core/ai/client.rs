//! Generation Client
//!
//! Wraps a provider with the tag-list contract: raw completions come back as
//! free text, and tag cleaning turns them into a bounded list of tag names.
//! Cleaning is identical whether the source call was text-only or
//! vision-augmented.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::core::CoreResult;

use super::GenerationProvider;

/// Maximum length of a cleaned tag line
pub const MAX_TAG_LEN: usize = 30;

// =============================================================================
// Generation Client
// =============================================================================

/// Client for the generation service used by the tagging pipelines
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn GenerationProvider>,
}

impl GenerationClient {
    /// Creates a client over a provider
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    /// Returns the underlying provider name
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Single-shot text completion
    pub async fn generate(&self, prompt: &str) -> CoreResult<String> {
        self.provider.generate(prompt).await
    }

    /// Completion with supporting images attached
    pub async fn generate_with_media(
        &self,
        prompt: &str,
        media: &[PathBuf],
    ) -> CoreResult<String> {
        self.provider.generate_with_media(prompt, media).await
    }

    /// Generates a cleaned tag list from a text-only prompt
    pub async fn generate_tag_list(&self, prompt: &str, max: usize) -> CoreResult<Vec<String>> {
        let raw = self.provider.generate(prompt).await?;
        Ok(clean_tag_list(&raw, max))
    }

    /// Generates a cleaned tag list from a vision-augmented prompt
    pub async fn generate_tag_list_with_media(
        &self,
        prompt: &str,
        media: &[PathBuf],
        max: usize,
    ) -> CoreResult<Vec<String>> {
        let raw = self.provider.generate_with_media(prompt, media).await?;
        Ok(clean_tag_list(&raw, max))
    }

    /// Connectivity check against the upstream service
    pub async fn health_check(&self) -> CoreResult<()> {
        self.provider.health_check().await
    }
}

// =============================================================================
// Tag Cleaning
// =============================================================================

fn enumeration_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\d.\-*•\s]+").unwrap())
}

/// Cleans a raw completion into a tag list.
///
/// Splits on line breaks, strips leading enumeration markers (digits, dots,
/// dashes, bullets) and surrounding whitespace, drops lines that end up empty
/// or longer than [`MAX_TAG_LEN`], deduplicates preserving first occurrence,
/// and caps the result at `max` entries.
pub fn clean_tag_list(raw: &str, max: usize) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    for line in raw.lines() {
        let cleaned = enumeration_marker().replace(line.trim(), "");
        let cleaned = cleaned.trim();

        if cleaned.is_empty() || cleaned.chars().count() >= MAX_TAG_LEN {
            continue;
        }
        if tags.iter().any(|t| t == cleaned) {
            continue;
        }

        tags.push(cleaned.to_string());
        if tags.len() == max {
            break;
        }
    }

    tags
}

// =============================================================================
// Tests
// =============================================================================
