//! Reeltag Core Library
//!
//! AI-driven media tagging engine. Orchestrates scene segmentation, frame
//! extraction, and a vision-capable generation service to produce a
//! provenance-aware tag graph over videos and images, and answers boolean
//! tag-set queries over it.
//!
//! The engine is a library: HTTP routing, upload handling, and
//! authentication belong to the surrounding service. Collaborators (the
//! generation provider, scene detector, and frame extractor) are injected
//! into the pipelines, so they can be backed by Ollama and FFmpeg in
//! production or by fakes in tests.

pub mod core;

pub use crate::core::ai::{GenerationClient, GenerationProvider, OllamaProvider};
pub use crate::core::search::{SearchEngine, SearchQuery, SearchResponse, TagUsage, TargetKind};
pub use crate::core::settings::EngineSettings;
pub use crate::core::store::{Database, Image, Provenance, Scene, Tag, TagOwner, Video};
pub use crate::core::tagging::{
    ImageTaggingPipeline, ImageTaggingReport, SceneReport, VideoTaggingPipeline,
    VideoTaggingReport,
};
pub use crate::core::{CoreError, CoreResult, MediaStatus};

/// Initializes tracing with an env-filter subscriber.
///
/// Convenience for binaries and integration tests embedding the engine;
/// respects `RUST_LOG`, defaulting to `info`. Calling it twice is a no-op.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
