//! Entity Operations
//!
//! CRUD for video, image, and scene rows. Deleting an entity cascades to its
//! scenes and tag associations at the schema level.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, Row};
use tracing::warn;

use crate::core::{CoreError, CoreResult, MediaStatus};

use super::models::{Image, Scene, Video};
use super::Database;

/// Serializes a timestamp in sortable RFC 3339 form
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a persisted timestamp, tolerating unparsable values
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Unparsable timestamp '{}': {}", s, e);
            Utc::now()
        })
}

fn parse_status(s: &str) -> MediaStatus {
    MediaStatus::parse(s).unwrap_or_else(|| {
        warn!("Unknown media status '{}', treating as error", s);
        MediaStatus::Error
    })
}

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<Video> {
    let status: String = row.get(7)?;
    let created_at: String = row.get(9)?;
    Ok(Video {
        id: row.get(0)?,
        filename: row.get(1)?,
        file_path: row.get(2)?,
        title: row.get(3)?,
        summary: row.get(4)?,
        user_notes: row.get(5)?,
        duration_sec: row.get(6)?,
        status: parse_status(&status),
        error: row.get(8)?,
        created_at: parse_datetime(&created_at),
    })
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<Image> {
    let status: String = row.get(9)?;
    let created_at: String = row.get(11)?;
    Ok(Image {
        id: row.get(0)?,
        filename: row.get(1)?,
        file_path: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        user_notes: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
        thumbnail_path: row.get(8)?,
        status: parse_status(&status),
        error: row.get(10)?,
        created_at: parse_datetime(&created_at),
    })
}

fn scene_from_row(row: &Row<'_>) -> rusqlite::Result<Scene> {
    let created_at: String = row.get(5)?;
    Ok(Scene {
        id: row.get(0)?,
        video_id: row.get(1)?,
        start_sec: row.get(2)?,
        end_sec: row.get(3)?,
        thumbnail_path: row.get(4)?,
        created_at: parse_datetime(&created_at),
    })
}

const VIDEO_COLUMNS: &str = "id, filename, file_path, title, summary, user_notes, duration_sec, status, error, created_at";
const IMAGE_COLUMNS: &str = "id, filename, file_path, title, description, user_notes, width, height, thumbnail_path, status, error, created_at";
const SCENE_COLUMNS: &str = "id, video_id, start_sec, end_sec, thumbnail_path, created_at";

// =============================================================================
// Video Operations
// =============================================================================

impl Database {
    /// Inserts a video row
    pub fn insert_video(&self, video: &Video) -> CoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO videos (id, filename, file_path, title, summary, user_notes, duration_sec, status, error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    video.id,
                    video.filename,
                    video.file_path,
                    video.title,
                    video.summary,
                    video.user_notes,
                    video.duration_sec,
                    video.status.as_str(),
                    video.error,
                    format_datetime(&video.created_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Loads a video row
    pub fn get_video(&self, video_id: &str) -> CoreResult<Video> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLUMNS),
                [video_id],
                video_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::VideoNotFound(video_id.to_string()))
        })
    }

    /// Updates a video's lifecycle status and error message
    pub fn set_video_status(
        &self,
        video_id: &str,
        status: MediaStatus,
        error: Option<&str>,
    ) -> CoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE videos SET status = ?1, error = ?2 WHERE id = ?3",
                rusqlite::params![status.as_str(), error, video_id],
            )?;
            if changed == 0 {
                return Err(CoreError::VideoNotFound(video_id.to_string()));
            }
            Ok(())
        })
    }

    /// Stores the generated summary on a video
    pub fn set_video_summary(&self, video_id: &str, summary: &str) -> CoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE videos SET summary = ?1 WHERE id = ?2",
                rusqlite::params![summary, video_id],
            )?;
            if changed == 0 {
                return Err(CoreError::VideoNotFound(video_id.to_string()));
            }
            Ok(())
        })
    }

    /// Deletes a video; scenes and associations cascade
    pub fn delete_video(&self, video_id: &str) -> CoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM videos WHERE id = ?1", [video_id])?;
            if changed == 0 {
                return Err(CoreError::VideoNotFound(video_id.to_string()));
            }
            Ok(())
        })
    }
}

// =============================================================================
// Image Operations
// =============================================================================

impl Database {
    /// Inserts an image row
    pub fn insert_image(&self, image: &Image) -> CoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO images (id, filename, file_path, title, description, user_notes, width, height, thumbnail_path, status, error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    image.id,
                    image.filename,
                    image.file_path,
                    image.title,
                    image.description,
                    image.user_notes,
                    image.width,
                    image.height,
                    image.thumbnail_path,
                    image.status.as_str(),
                    image.error,
                    format_datetime(&image.created_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Loads an image row
    pub fn get_image(&self, image_id: &str) -> CoreResult<Image> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM images WHERE id = ?1", IMAGE_COLUMNS),
                [image_id],
                image_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::ImageNotFound(image_id.to_string()))
        })
    }

    /// Updates an image's lifecycle status and error message
    pub fn set_image_status(
        &self,
        image_id: &str,
        status: MediaStatus,
        error: Option<&str>,
    ) -> CoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE images SET status = ?1, error = ?2 WHERE id = ?3",
                rusqlite::params![status.as_str(), error, image_id],
            )?;
            if changed == 0 {
                return Err(CoreError::ImageNotFound(image_id.to_string()));
            }
            Ok(())
        })
    }

    /// Stores the generated description on an image
    pub fn set_image_description(&self, image_id: &str, description: &str) -> CoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE images SET description = ?1 WHERE id = ?2",
                rusqlite::params![description, image_id],
            )?;
            if changed == 0 {
                return Err(CoreError::ImageNotFound(image_id.to_string()));
            }
            Ok(())
        })
    }

    /// Deletes an image; associations cascade
    pub fn delete_image(&self, image_id: &str) -> CoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM images WHERE id = ?1", [image_id])?;
            if changed == 0 {
                return Err(CoreError::ImageNotFound(image_id.to_string()));
            }
            Ok(())
        })
    }
}

// =============================================================================
// Scene Operations
// =============================================================================

impl Database {
    /// Inserts a scene row
    pub fn insert_scene(&self, scene: &Scene) -> CoreResult<()> {
        if scene.end_sec <= scene.start_sec {
            return Err(CoreError::Validation(format!(
                "Scene range must satisfy start < end, got {:.3}~{:.3}",
                scene.start_sec, scene.end_sec
            )));
        }
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO scenes (id, video_id, start_sec, end_sec, thumbnail_path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    scene.id,
                    scene.video_id,
                    scene.start_sec,
                    scene.end_sec,
                    scene.thumbnail_path,
                    format_datetime(&scene.created_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Loads a scene row
    pub fn get_scene(&self, scene_id: &str) -> CoreResult<Scene> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM scenes WHERE id = ?1", SCENE_COLUMNS),
                [scene_id],
                scene_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::SceneNotFound(scene_id.to_string()))
        })
    }

    /// Lists a video's scenes in ascending start-time order
    pub fn list_scenes(&self, video_id: &str) -> CoreResult<Vec<Scene>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM scenes WHERE video_id = ?1 ORDER BY start_sec",
                SCENE_COLUMNS
            ))?;
            let scenes = stmt
                .query_map([video_id], scene_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(scenes)
        })
    }

    /// Stores the representative thumbnail path on a scene
    pub fn set_scene_thumbnail(&self, scene_id: &str, thumbnail_path: &str) -> CoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE scenes SET thumbnail_path = ?1 WHERE id = ?2",
                rusqlite::params![thumbnail_path, scene_id],
            )?;
            if changed == 0 {
                return Err(CoreError::SceneNotFound(scene_id.to_string()));
            }
            Ok(())
        })
    }

    /// Deletes all scenes of a video; scene associations cascade
    pub fn delete_video_scenes(&self, video_id: &str) -> CoreResult<usize> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM scenes WHERE video_id = ?1", [video_id])?;
            Ok(deleted)
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
