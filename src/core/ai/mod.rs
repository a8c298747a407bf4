//! Generation Service Module
//!
//! Abstracts the text/vision generation service used for summaries,
//! descriptions, and tag lists. The engine talks to one logical upstream
//! provider; implementations are injected so tests can substitute fakes.

mod client;
mod ollama;
mod provider;

pub use client::{clean_tag_list, GenerationClient, MAX_TAG_LEN};
pub use ollama::OllamaProvider;
pub use provider::GenerationProvider;
