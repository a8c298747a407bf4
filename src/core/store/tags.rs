//! Tag Store Operations
//!
//! The provenance-aware many-to-many tag model shared by all entity kinds.
//! Every operation is idempotent: repeated calls with the same arguments
//! leave the store unchanged after the first. Uniqueness comes from the
//! schema, so concurrent callers cannot create duplicate tags or duplicate
//! (owner, tag) associations.

use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::core::{CoreError, CoreResult};

use super::entities::{format_datetime, parse_datetime};
use super::models::{AttachedTag, Provenance, Tag, TagOwner};
use super::Database;

impl Database {
    // =========================================================================
    // Tag Lookup and Creation
    // =========================================================================

    /// Finds a tag by exact, case-sensitive name
    pub fn get_tag(&self, name: &str) -> CoreResult<Option<Tag>> {
        self.with_conn(|conn| {
            let tag = conn
                .query_row(
                    "SELECT id, name, created_at FROM tags WHERE name = ?1",
                    [name],
                    |row| {
                        let created_at: String = row.get(2)?;
                        Ok(Tag {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            created_at: parse_datetime(&created_at),
                        })
                    },
                )
                .optional()?;
            Ok(tag)
        })
    }

    /// Finds a tag by name, creating it on first use.
    ///
    /// INSERT OR IGNORE against the UNIQUE(name) constraint keeps creation
    /// idempotent under concurrency; the subsequent select returns whichever
    /// row won.
    pub fn find_or_create_tag(&self, name: &str) -> CoreResult<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("Tag name must not be empty".to_string()));
        }

        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO tags (id, name, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    ulid::Ulid::new().to_string(),
                    name,
                    format_datetime(&Utc::now()),
                ],
            )?;
            Ok(())
        })?;

        self.get_tag(name)?
            .ok_or_else(|| CoreError::Database(format!("Tag '{}' vanished after insert", name)))
    }

    // =========================================================================
    // Associations
    // =========================================================================

    /// Attaches a tag to an owner unless an association already exists.
    ///
    /// Returns whether a new association was created. An existing
    /// association, whatever its provenance, is left untouched; duplicate
    /// suggestions are discarded, not stacked.
    pub fn attach(
        &self,
        owner: TagOwner<'_>,
        tag_id: &str,
        provenance: Provenance,
    ) -> CoreResult<bool> {
        self.with_conn(|conn| {
            let sql = format!(
                "INSERT OR IGNORE INTO {} (id, {}, tag_id, source, confidence, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                owner.table(),
                owner.column()
            );
            let changed = conn.execute(
                &sql,
                rusqlite::params![
                    ulid::Ulid::new().to_string(),
                    owner.id(),
                    tag_id,
                    provenance.source_str(),
                    provenance.confidence(),
                    format_datetime(&Utc::now()),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Deletes all AI-generated associations of an owner.
    ///
    /// User-authored associations survive no matter how often this runs.
    pub fn clear_generated(&self, owner: TagOwner<'_>) -> CoreResult<usize> {
        self.with_conn(|conn| {
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?1 AND source != 'user'",
                owner.table(),
                owner.column()
            );
            let deleted = conn.execute(&sql, [owner.id()])?;
            Ok(deleted)
        })
    }

    /// Lists an owner's tags with their provenance
    pub fn list_tags(&self, owner: TagOwner<'_>) -> CoreResult<Vec<AttachedTag>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT t.id, t.name, t.created_at, a.source, a.confidence
                 FROM tags t JOIN {} a ON a.tag_id = t.id
                 WHERE a.{} = ?1
                 ORDER BY t.name",
                owner.table(),
                owner.column()
            );
            let mut stmt = conn.prepare(&sql)?;
            let tags = stmt
                .query_map([owner.id()], |row| {
                    let created_at: String = row.get(2)?;
                    let source: String = row.get(3)?;
                    let confidence: Option<f64> = row.get(4)?;
                    Ok(AttachedTag {
                        tag: Tag {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            created_at: parse_datetime(&created_at),
                        },
                        provenance: Provenance::from_row(&source, confidence),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tags)
        })
    }

    /// Lists an owner's tag names (convenience for reports and search rows)
    pub fn list_tag_names(&self, owner: TagOwner<'_>) -> CoreResult<Vec<String>> {
        Ok(self
            .list_tags(owner)?
            .into_iter()
            .map(|at| at.tag.name)
            .collect())
    }
}

// =============================================================================
// Tests
// =============================================================================
