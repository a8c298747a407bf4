//! Boolean Search Module
//!
//! AND/OR/NOT tag-set queries with pagination over the tag store, plus the
//! tag-usage listing. Reads only; never mutates the store.
//!
//! Per target kind the engine starts from the full id set and narrows it:
//! every AND name must resolve and match (an unknown name empties the
//! result), OR keeps owners matching at least one resolved name (a non-empty
//! OR list with no resolved names empties the result), and NOT subtracts
//! owners of each resolved name (unknown NOT names exclude nothing).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::store::{Database, TagOwner};
use crate::core::{CoreResult, MediaStatus, TimeSec};

// =============================================================================
// Query Types
// =============================================================================

/// Target entity kinds for a search
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetKind {
    Videos,
    Scenes,
    Images,
}

impl TargetKind {
    fn entity_table(&self) -> &'static str {
        match self {
            TargetKind::Videos => "videos",
            TargetKind::Scenes => "scenes",
            TargetKind::Images => "images",
        }
    }

    fn assoc_table(&self) -> &'static str {
        match self {
            TargetKind::Videos => "video_tags",
            TargetKind::Scenes => "scene_tags",
            TargetKind::Images => "image_tags",
        }
    }

    fn owner_column(&self) -> &'static str {
        match self {
            TargetKind::Videos => "video_id",
            TargetKind::Scenes => "scene_id",
            TargetKind::Images => "image_id",
        }
    }
}

/// A boolean tag search query
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Owners must carry every one of these tags
    #[serde(default)]
    pub and_tags: Vec<String>,
    /// Owners must carry at least one of these tags
    #[serde(default)]
    pub or_tags: Vec<String>,
    /// Owners must carry none of these tags
    #[serde(default)]
    pub not_tags: Vec<String>,
    /// Entity kinds to search
    #[serde(default = "all_targets")]
    pub targets: Vec<TargetKind>,
    /// 1-based page number
    #[serde(default = "default_page")]
    pub page: usize,
    /// Page size
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn all_targets() -> Vec<TargetKind> {
    vec![TargetKind::Videos, TargetKind::Scenes, TargetKind::Images]
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    20
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            and_tags: Vec::new(),
            or_tags: Vec::new(),
            not_tags: Vec::new(),
            targets: all_targets(),
            page: default_page(),
            limit: default_limit(),
        }
    }
}

// =============================================================================
// Result Types
// =============================================================================

/// A video search result row
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResult {
    pub id: String,
    pub filename: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub duration_sec: Option<TimeSec>,
    pub status: MediaStatus,
    pub tags: Vec<String>,
    pub created_at: String,
}

/// A scene search result row
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneResult {
    pub id: String,
    pub video_id: String,
    pub video_filename: String,
    pub start_sec: TimeSec,
    pub end_sec: TimeSec,
    pub thumbnail_path: Option<String>,
    pub tags: Vec<String>,
}

/// An image search result row
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub id: String,
    pub filename: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_path: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub status: MediaStatus,
    pub tags: Vec<String>,
    pub created_at: String,
}

/// Combined search response with per-kind totals
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub videos: Vec<VideoResult>,
    pub scenes: Vec<SceneResult>,
    pub images: Vec<ImageResult>,
    /// Matching counts before pagination
    pub total_videos: usize,
    pub total_scenes: usize,
    pub total_images: usize,
    pub page: usize,
    pub limit: usize,
}

/// A tag with per-kind usage counts
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagUsage {
    pub id: String,
    pub name: String,
    pub video_count: usize,
    pub scene_count: usize,
    pub image_count: usize,
}

impl TagUsage {
    /// Total usage across all kinds
    pub fn total(&self) -> usize {
        self.video_count + self.scene_count + self.image_count
    }
}

// =============================================================================
// Search Engine
// =============================================================================

/// Boolean tag search over the store
pub struct SearchEngine {
    db: Database,
}

impl SearchEngine {
    /// Creates an engine over a store handle
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Runs a boolean tag search across the requested target kinds.
    ///
    /// Results are ordered by creation time descending; totals count all
    /// matches before pagination.
    pub fn search(&self, query: &SearchQuery) -> CoreResult<SearchResponse> {
        let mut response = SearchResponse {
            page: query.page,
            limit: query.limit,
            ..Default::default()
        };

        for kind in &query.targets {
            let (page_ids, total) = self.match_ids(*kind, query)?;
            match kind {
                TargetKind::Videos => {
                    response.total_videos = total;
                    for id in page_ids {
                        response.videos.push(self.video_result(&id)?);
                    }
                }
                TargetKind::Scenes => {
                    response.total_scenes = total;
                    for id in page_ids {
                        response.scenes.push(self.scene_result(&id)?);
                    }
                }
                TargetKind::Images => {
                    response.total_images = total;
                    for id in page_ids {
                        response.images.push(self.image_result(&id)?);
                    }
                }
            }
        }

        Ok(response)
    }

    /// Computes the paged matching ids and the pre-pagination total
    fn match_ids(
        &self,
        kind: TargetKind,
        query: &SearchQuery,
    ) -> CoreResult<(Vec<String>, usize)> {
        // Constraint set; `None` means unconstrained so far
        let mut included: Option<HashSet<String>> = None;

        // AND: every name must resolve and match
        for name in &query.and_tags {
            let Some(tag) = self.db.get_tag(name)? else {
                return Ok((Vec::new(), 0));
            };
            let owners = self.owners_with_tag(kind, &tag.id)?;
            included = Some(match included {
                None => owners,
                Some(set) => set.intersection(&owners).cloned().collect(),
            });
        }

        // OR: at least one resolved name must match
        if !query.or_tags.is_empty() {
            let mut union: HashSet<String> = HashSet::new();
            let mut resolved_any = false;
            for name in &query.or_tags {
                if let Some(tag) = self.db.get_tag(name)? {
                    resolved_any = true;
                    union.extend(self.owners_with_tag(kind, &tag.id)?);
                }
            }
            if !resolved_any {
                return Ok((Vec::new(), 0));
            }
            included = Some(match included {
                None => union,
                Some(set) => set.intersection(&union).cloned().collect(),
            });
        }

        // NOT: subtract owners of each resolved name
        let mut excluded: HashSet<String> = HashSet::new();
        for name in &query.not_tags {
            if let Some(tag) = self.db.get_tag(name)? {
                excluded.extend(self.owners_with_tag(kind, &tag.id)?);
            }
        }

        let ordered = self.ordered_ids(kind)?;
        let matching: Vec<String> = ordered
            .into_iter()
            .filter(|id| included.as_ref().map_or(true, |set| set.contains(id)))
            .filter(|id| !excluded.contains(id))
            .collect();

        let total = matching.len();
        let offset = query.page.max(1).saturating_sub(1) * query.limit;
        let page_ids = matching
            .into_iter()
            .skip(offset)
            .take(query.limit)
            .collect();

        Ok((page_ids, total))
    }

    /// All ids of a kind, newest first
    fn ordered_ids(&self, kind: TargetKind) -> CoreResult<Vec<String>> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT id FROM {} ORDER BY created_at DESC, rowid DESC",
                kind.entity_table()
            );
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    /// Ids of owners carrying a tag
    fn owners_with_tag(&self, kind: TargetKind, tag_id: &str) -> CoreResult<HashSet<String>> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM {} WHERE tag_id = ?1",
                kind.owner_column(),
                kind.assoc_table()
            );
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map([tag_id], |row| row.get::<_, String>(0))?
                .collect::<Result<HashSet<_>, _>>()?;
            Ok(ids)
        })
    }

    // =========================================================================
    // Row Hydration
    // =========================================================================

    fn video_result(&self, id: &str) -> CoreResult<VideoResult> {
        let video = self.db.get_video(id)?;
        let tags = self.db.list_tag_names(TagOwner::Video(id))?;
        Ok(VideoResult {
            id: video.id,
            filename: video.filename,
            title: video.title,
            summary: video.summary,
            duration_sec: video.duration_sec,
            status: video.status,
            tags,
            created_at: video.created_at.to_rfc3339(),
        })
    }

    fn scene_result(&self, id: &str) -> CoreResult<SceneResult> {
        let scene = self.db.get_scene(id)?;
        let video = self.db.get_video(&scene.video_id)?;
        let tags = self.db.list_tag_names(TagOwner::Scene(id))?;
        Ok(SceneResult {
            id: scene.id,
            video_id: scene.video_id,
            video_filename: video.filename,
            start_sec: scene.start_sec,
            end_sec: scene.end_sec,
            thumbnail_path: scene.thumbnail_path,
            tags,
        })
    }

    fn image_result(&self, id: &str) -> CoreResult<ImageResult> {
        let image = self.db.get_image(id)?;
        let tags = self.db.list_tag_names(TagOwner::Image(id))?;
        Ok(ImageResult {
            id: image.id,
            filename: image.filename,
            title: image.title,
            description: image.description,
            thumbnail_path: image.thumbnail_path,
            width: image.width,
            height: image.height,
            status: image.status,
            tags,
            created_at: image.created_at.to_rfc3339(),
        })
    }

    // =========================================================================
    // Tag Listing
    // =========================================================================

    /// Lists every tag with per-kind usage counts, highest total first
    pub fn list_tag_usage(&self) -> CoreResult<Vec<TagUsage>> {
        let mut usages = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.name,
                        (SELECT COUNT(*) FROM video_tags WHERE tag_id = t.id),
                        (SELECT COUNT(*) FROM scene_tags WHERE tag_id = t.id),
                        (SELECT COUNT(*) FROM image_tags WHERE tag_id = t.id)
                 FROM tags t",
            )?;
            let usages = stmt
                .query_map([], |row| {
                    Ok(TagUsage {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        video_count: row.get::<_, i64>(2)? as usize,
                        scene_count: row.get::<_, i64>(3)? as usize,
                        image_count: row.get::<_, i64>(4)? as usize,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(usages)
        })?;

        usages.sort_by(|a, b| b.total().cmp(&a.total()).then_with(|| a.name.cmp(&b.name)));
        Ok(usages)
    }
}

// =============================================================================
// Tests
// =============================================================================
