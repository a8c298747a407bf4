//! Store Models
//!
//! Row types for the relational store: entities, scenes, tags, and the
//! provenance-aware tag association.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{ImageId, MediaStatus, SceneId, TagId, TimeSec, VideoId};

// =============================================================================
// Provenance
// =============================================================================

/// Origin of a tag association.
///
/// User-authored associations are protected: `clear_generated` never touches
/// them. AI-generated associations carry an optional confidence score and are
/// replaced on re-tagging. The legacy convention "confidence == 1.0 means
/// user-authored" is preserved at the conversion boundary.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "score")]
pub enum Provenance {
    /// Supplied by a user; immutable under re-tagging
    UserDefined,
    /// Produced by the generation pipeline, with an optional confidence score
    AiGenerated(Option<f64>),
}

impl Provenance {
    /// Whether this association is user-authored
    pub fn is_user_defined(&self) -> bool {
        matches!(self, Provenance::UserDefined)
    }

    /// Maps a raw confidence value to provenance (1.0 means user-authored)
    pub fn from_confidence(confidence: Option<f64>) -> Self {
        match confidence {
            Some(c) if c == 1.0 => Provenance::UserDefined,
            other => Provenance::AiGenerated(other),
        }
    }

    /// Maps provenance back to the raw confidence convention
    pub fn confidence(&self) -> Option<f64> {
        match self {
            Provenance::UserDefined => Some(1.0),
            Provenance::AiGenerated(score) => *score,
        }
    }

    /// Persisted discriminator string
    pub(crate) fn source_str(&self) -> &'static str {
        match self {
            Provenance::UserDefined => "user",
            Provenance::AiGenerated(_) => "ai",
        }
    }

    /// Parses the persisted discriminator plus score column
    pub(crate) fn from_row(source: &str, confidence: Option<f64>) -> Self {
        match source {
            "user" => Provenance::UserDefined,
            _ => Provenance::AiGenerated(confidence),
        }
    }
}

// =============================================================================
// Entities
// =============================================================================

/// A video row
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    /// Unique video ID
    pub id: VideoId,
    /// Original filename
    pub filename: String,
    /// Path to the media file on disk
    pub file_path: String,
    /// User-supplied title
    pub title: Option<String>,
    /// Generated summary
    pub summary: Option<String>,
    /// Free-text user notes
    pub user_notes: Option<String>,
    /// Duration in seconds, if known
    pub duration_sec: Option<TimeSec>,
    /// Lifecycle status
    pub status: MediaStatus,
    /// Error message from the last failed tagging run
    pub error: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Video {
    /// Creates a new uploaded video row
    pub fn new(filename: &str, file_path: &str) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            filename: filename.to_string(),
            file_path: file_path.to_string(),
            title: None,
            summary: None,
            user_notes: None,
            duration_sec: None,
            status: MediaStatus::Uploaded,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the known duration
    pub fn with_duration(mut self, duration_sec: TimeSec) -> Self {
        self.duration_sec = Some(duration_sec);
        self
    }

    /// Sets the title
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
}

/// An image row
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Unique image ID
    pub id: ImageId,
    /// Original filename
    pub filename: String,
    /// Path to the media file on disk
    pub file_path: String,
    /// User-supplied title
    pub title: Option<String>,
    /// Generated description
    pub description: Option<String>,
    /// Free-text user notes
    pub user_notes: Option<String>,
    /// Pixel width, if known
    pub width: Option<u32>,
    /// Pixel height, if known
    pub height: Option<u32>,
    /// Path to a display thumbnail
    pub thumbnail_path: Option<String>,
    /// Lifecycle status
    pub status: MediaStatus,
    /// Error message from the last failed tagging run
    pub error: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Image {
    /// Creates a new uploaded image row
    pub fn new(filename: &str, file_path: &str) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            filename: filename.to_string(),
            file_path: file_path.to_string(),
            title: None,
            description: None,
            user_notes: None,
            width: None,
            height: None,
            thumbnail_path: None,
            status: MediaStatus::Uploaded,
            error: None,
            created_at: Utc::now(),
        }
    }
}

/// A scene row, owned by exactly one video
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Unique scene ID
    pub id: SceneId,
    /// Owning video ID
    pub video_id: VideoId,
    /// Start time in seconds
    pub start_sec: TimeSec,
    /// End time in seconds
    pub end_sec: TimeSec,
    /// Path to the representative thumbnail
    pub thumbnail_path: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Scene {
    /// Creates a new scene row
    pub fn new(video_id: &str, start_sec: TimeSec, end_sec: TimeSec) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            video_id: video_id.to_string(),
            start_sec,
            end_sec,
            thumbnail_path: None,
            created_at: Utc::now(),
        }
    }

    /// Returns the midpoint time of the scene
    pub fn midpoint(&self) -> TimeSec {
        (self.start_sec + self.end_sec) / 2.0
    }
}

// =============================================================================
// Tags
// =============================================================================

/// A globally unique tag
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Unique tag ID
    pub id: TagId,
    /// Tag name; globally unique, case-sensitive
    pub name: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// A tag attached to an owner, with its provenance
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedTag {
    /// The tag
    pub tag: Tag,
    /// How the association came to be
    pub provenance: Provenance,
}

/// The owner of a tag association
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagOwner<'a> {
    Video(&'a str),
    Scene(&'a str),
    Image(&'a str),
}

impl<'a> TagOwner<'a> {
    /// Association table for this owner kind
    pub(crate) fn table(&self) -> &'static str {
        match self {
            TagOwner::Video(_) => "video_tags",
            TagOwner::Scene(_) => "scene_tags",
            TagOwner::Image(_) => "image_tags",
        }
    }

    /// Owner id column in the association table
    pub(crate) fn column(&self) -> &'static str {
        match self {
            TagOwner::Video(_) => "video_id",
            TagOwner::Scene(_) => "scene_id",
            TagOwner::Image(_) => "image_id",
        }
    }

    /// Owner row id
    pub(crate) fn id(&self) -> &'a str {
        match self {
            TagOwner::Video(id) | TagOwner::Scene(id) | TagOwner::Image(id) => id,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
