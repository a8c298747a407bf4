//! Settings Persistence System
//!
//! Provides persistent engine settings with:
//! - Atomic file writes (temp file + rename)
//! - Schema validation with defaults
//! - Normalization of out-of-range values
//!
//! Storage location: `{data_dir}/settings.json`

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::core::{CoreError, CoreResult};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

// =============================================================================
// Engine Settings
// =============================================================================

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Generation service settings
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Scene detection settings
    #[serde(default)]
    pub scenes: SceneSettings,

    /// Tagging pipeline settings
    #[serde(default)]
    pub tagging: TaggingSettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            generation: GenerationSettings::default(),
            scenes: SceneSettings::default(),
            tagging: TaggingSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

/// Generation service (Ollama) settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    /// Base URL of the generation service
    pub base_url: String,
    /// Model used for text and vision calls
    pub model: String,
    /// Timeout for text-only calls (seconds)
    pub text_timeout_secs: u64,
    /// Timeout for vision calls carrying image payloads (seconds)
    pub vision_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            text_timeout_secs: 120,
            vision_timeout_secs: 180,
        }
    }
}

/// Scene detection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SceneSettings {
    /// Scene change threshold (0.0 - 1.0, lower detects more cuts)
    pub threshold: f64,
    /// Minimum scene duration in seconds
    pub min_scene_duration: f64,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            min_scene_duration: 0.5,
        }
    }
}

/// Tagging pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaggingSettings {
    /// Frame budget per scene for vision analysis
    pub frames_per_scene: u32,
    /// Maximum tags attached per scene
    pub scene_tag_cap: usize,
    /// Maximum general tags attached per video
    pub video_tag_cap: usize,
    /// Maximum tags attached per image
    pub image_tag_cap: usize,
}

impl Default for TaggingSettings {
    fn default() -> Self {
        Self {
            frames_per_scene: 3,
            scene_tag_cap: 7,
            video_tag_cap: 10,
            image_tag_cap: 15,
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    /// Directory for extracted frames and scene thumbnails
    pub thumbnails_dir: Option<PathBuf>,
}

// =============================================================================
// Normalization
// =============================================================================

impl EngineSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Tolerant on purpose: corrects bad values instead of failing, so
    /// corrupted or old config files don't brick the engine.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        if self.generation.base_url.trim().is_empty() {
            self.generation.base_url = GenerationSettings::default().base_url;
        }
        if self.generation.model.trim().is_empty() {
            self.generation.model = GenerationSettings::default().model;
        }
        self.generation.text_timeout_secs = self.generation.text_timeout_secs.clamp(5, 600);
        self.generation.vision_timeout_secs = self
            .generation
            .vision_timeout_secs
            .clamp(self.generation.text_timeout_secs, 1200);

        self.scenes.threshold = clamp_f64(self.scenes.threshold, 0.01, 1.0);
        self.scenes.min_scene_duration = clamp_f64(self.scenes.min_scene_duration, 0.0, 60.0);

        self.tagging.frames_per_scene = self.tagging.frames_per_scene.clamp(1, 10);
        self.tagging.scene_tag_cap = self.tagging.scene_tag_cap.clamp(1, 20);
        self.tagging.video_tag_cap = self.tagging.video_tag_cap.clamp(1, 30);
        self.tagging.image_tag_cap = self.tagging.image_tag_cap.clamp(1, 30);
    }

    /// Loads settings from a data directory, falling back to defaults.
    ///
    /// A missing file yields defaults; an unreadable or unparsable file is
    /// logged and replaced by defaults.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        if !path.exists() {
            return Self::default();
        }

        let mut settings = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<EngineSettings>(&content) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Failed to parse settings file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file {}: {}", path.display(), e);
                Self::default()
            }
        };

        settings.normalize();
        settings
    }

    /// Saves settings atomically (temp file + rename)
    pub fn save(&self, data_dir: &Path) -> CoreResult<()> {
        fs::create_dir_all(data_dir)?;

        let path = data_dir.join(SETTINGS_FILE);
        let temp_path = data_dir.join(format!(".{}.tmp.{}", SETTINGS_FILE, std::process::id()));

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&temp_path, &content)?;

        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            CoreError::Internal(format!(
                "Failed to rename settings file {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

// =============================================================================
// Tests
// =============================================================================
