//! Relational Store Module
//!
//! SQLite store for entities, scenes, tags, and tag associations. The
//! connection lives behind a mutex and the handle is cheap to clone, so
//! concurrent pipelines share one store. Uniqueness is enforced by the
//! schema: tag names are globally unique and each (owner, tag) pair holds at
//! most one association, which makes `find_or_create_tag` and `attach` safe
//! to call repeatedly and concurrently.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::core::{CoreError, CoreResult};

mod entities;
mod models;
mod tags;

pub use models::{AttachedTag, Image, Provenance, Scene, Tag, TagOwner, Video};

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the SQLite store
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) a database at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| CoreError::Database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Creates an in-memory database (for testing)
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CoreError::Database(format!("Failed to create in-memory database: {}", e))
        })?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Runs a closure against the locked connection
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Database("Connection lock poisoned".to_string()))?;
        f(&conn)
    }

    /// Initializes the database schema
    fn init_schema(&self) -> CoreResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                PRAGMA foreign_keys = ON;

                -- Entity tables
                CREATE TABLE IF NOT EXISTS videos (
                    id TEXT PRIMARY KEY,
                    filename TEXT NOT NULL,
                    file_path TEXT NOT NULL,
                    title TEXT,
                    summary TEXT,
                    user_notes TEXT,
                    duration_sec REAL,
                    status TEXT NOT NULL DEFAULT 'uploaded',
                    error TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS images (
                    id TEXT PRIMARY KEY,
                    filename TEXT NOT NULL,
                    file_path TEXT NOT NULL,
                    title TEXT,
                    description TEXT,
                    user_notes TEXT,
                    width INTEGER,
                    height INTEGER,
                    thumbnail_path TEXT,
                    status TEXT NOT NULL DEFAULT 'uploaded',
                    error TEXT,
                    created_at TEXT NOT NULL
                );

                -- Scenes belong to exactly one video
                CREATE TABLE IF NOT EXISTS scenes (
                    id TEXT PRIMARY KEY,
                    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                    start_sec REAL NOT NULL,
                    end_sec REAL NOT NULL,
                    thumbnail_path TEXT,
                    created_at TEXT NOT NULL
                );

                -- Tags are globally unique by name (case-sensitive)
                CREATE TABLE IF NOT EXISTS tags (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL
                );

                -- One association per (owner, tag) pair
                CREATE TABLE IF NOT EXISTS video_tags (
                    id TEXT PRIMARY KEY,
                    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                    tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    source TEXT NOT NULL,
                    confidence REAL,
                    created_at TEXT NOT NULL,
                    UNIQUE(video_id, tag_id)
                );

                CREATE TABLE IF NOT EXISTS scene_tags (
                    id TEXT PRIMARY KEY,
                    scene_id TEXT NOT NULL REFERENCES scenes(id) ON DELETE CASCADE,
                    tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    source TEXT NOT NULL,
                    confidence REAL,
                    created_at TEXT NOT NULL,
                    UNIQUE(scene_id, tag_id)
                );

                CREATE TABLE IF NOT EXISTS image_tags (
                    id TEXT PRIMARY KEY,
                    image_id TEXT NOT NULL REFERENCES images(id) ON DELETE CASCADE,
                    tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    source TEXT NOT NULL,
                    confidence REAL,
                    created_at TEXT NOT NULL,
                    UNIQUE(image_id, tag_id)
                );

                -- Indexes for efficient queries
                CREATE INDEX IF NOT EXISTS idx_scenes_video ON scenes(video_id, start_sec);
                CREATE INDEX IF NOT EXISTS idx_video_tags_tag ON video_tags(tag_id);
                CREATE INDEX IF NOT EXISTS idx_scene_tags_tag ON scene_tags(tag_id);
                CREATE INDEX IF NOT EXISTS idx_image_tags_tag ON image_tags(tag_id);
                "#,
            )
            .map_err(|e| CoreError::Database(format!("Failed to initialize schema: {}", e)))?;
            Ok(())
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_creation() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_open_db_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reeltag.db");

        let _db = Database::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_clone_shares_connection() {
        let db = Database::in_memory().unwrap();
        let clone = db.clone();

        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tags (id, name, created_at) VALUES ('t1', 'beach', '2026-01-01')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        clone
            .with_conn(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
                assert_eq!(count, 1);
                Ok(())
            })
            .unwrap();
    }
}
