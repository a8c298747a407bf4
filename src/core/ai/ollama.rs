//! Ollama Provider Implementation
//!
//! Implements the GenerationProvider trait against a local Ollama server.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::settings::GenerationSettings;
use crate::core::{CoreError, CoreResult};

use super::GenerationProvider;

// =============================================================================
// Ollama Provider
// =============================================================================

/// Generation provider backed by an Ollama server
pub struct OllamaProvider {
    /// Base URL for the Ollama API
    base_url: String,
    /// Model used for both text and vision calls
    model: String,
    /// Client for text-only calls (short timeout)
    text_client: reqwest::Client,
    /// Client for vision calls carrying image payloads (long timeout)
    vision_client: reqwest::Client,
}

impl OllamaProvider {
    /// Default Ollama API base URL
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";

    /// Creates a provider from generation settings
    pub fn new(settings: &GenerationSettings) -> CoreResult<Self> {
        let text_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.text_timeout_secs))
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let vision_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.vision_timeout_secs))
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            text_client,
            vision_client,
        })
    }

    /// Encodes images for attachment, skipping files that cannot be read
    fn encode_images(media: &[PathBuf]) -> Vec<String> {
        let mut encoded = Vec::new();
        for path in media {
            match std::fs::read(path) {
                Ok(bytes) => {
                    encoded.push(base64::engine::general_purpose::STANDARD.encode(bytes));
                }
                Err(e) => {
                    warn!("Skipping unreadable image {}: {}", path.display(), e);
                }
            }
        }
        encoded
    }

    /// Sends a generate request and extracts the response text
    async fn send(
        &self,
        client: &reqwest::Client,
        request: &GenerateRequest,
    ) -> CoreResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let response = client.post(&url).json(request).send().await.map_err(|e| {
            if e.is_timeout() {
                CoreError::Timeout(format!("Generation request to {} timed out", self.base_url))
            } else {
                CoreError::Upstream(format!(
                    "Failed to reach generation service at {}: {}",
                    self.base_url, e
                ))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Upstream(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(CoreError::Upstream(format!(
                "Generation service error ({}): {}",
                status, body
            )));
        }

        let api_response: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| CoreError::Upstream(format!("Failed to parse response: {}", e)))?;

        Ok(api_response.response)
    }
}

// =============================================================================
// Ollama API Types
// =============================================================================

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

// =============================================================================
// GenerationProvider Implementation
// =============================================================================

#[async_trait]
impl GenerationProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> CoreResult<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            images: None,
            stream: false,
        };
        self.send(&self.text_client, &request).await
    }

    async fn generate_with_media(&self, prompt: &str, media: &[PathBuf]) -> CoreResult<String> {
        let images = Self::encode_images(media);
        debug!(
            "Vision request with {}/{} readable images",
            images.len(),
            media.len()
        );

        if images.is_empty() {
            // Nothing to attach; degrade to the text path
            return self.generate(prompt).await;
        }

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            images: Some(images),
            stream: false,
        };
        self.send(&self.vision_client, &request).await
    }

    async fn health_check(&self) -> CoreResult<()> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .text_client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::Upstream(format!("Generation service unreachable: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CoreError::Upstream(format!(
                "Generation service at {} returned {}",
                self.base_url,
                response.status()
            )))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
