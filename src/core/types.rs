//! Reeltag Core Type Definitions
//!
//! Defines fundamental types used throughout the engine.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Video unique identifier (ULID)
pub type VideoId = String;

/// Image unique identifier (ULID)
pub type ImageId = String;

/// Scene unique identifier (ULID)
pub type SceneId = String;

/// Tag unique identifier (ULID)
pub type TagId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

// =============================================================================
// Media Lifecycle
// =============================================================================

/// Lifecycle status of a taggable entity (video or image)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaStatus {
    /// Uploaded but never tagged
    Uploaded,
    /// A tagging run is in progress
    Processing,
    /// Last tagging run completed
    Tagged,
    /// Last tagging run failed; accepts a fresh run
    Error,
}

impl MediaStatus {
    /// Parses the status from its persisted string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(Self::Uploaded),
            "processing" => Some(Self::Processing),
            "tagged" => Some(Self::Tagged),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns the persisted string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Tagged => "tagged",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
