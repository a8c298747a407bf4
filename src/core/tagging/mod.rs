//! Tagging Orchestration Module
//!
//! Per-entity tagging workflows for videos and images. One pipeline instance
//! per entity kind, sharing the same shape: clear prior generated output when
//! re-tagging, mark the entity `processing`, run the generation stages, and
//! finish `tagged` or `error`. Each stage commits its results before the next
//! stage begins, so a failed run leaves a consistent, partially-tagged
//! entity.

mod context;
mod image;
mod video;

pub use context::position_label;
pub use image::ImageTaggingPipeline;
pub use video::VideoTaggingPipeline;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{CoreResult, MediaStatus, TimeSec};

// =============================================================================
// Reports
// =============================================================================

/// One scene in a video tagging report
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneReport {
    /// Scene ID
    pub id: String,
    /// Start time in seconds
    pub start_sec: TimeSec,
    /// End time in seconds
    pub end_sec: TimeSec,
    /// Representative thumbnail, if extraction succeeded
    pub thumbnail_path: Option<String>,
    /// Tags attached to this scene during the run
    pub tags: Vec<String>,
}

/// Result payload of a video tagging run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoTaggingReport {
    /// Video ID
    pub video_id: String,
    /// Final lifecycle status
    pub status: MediaStatus,
    /// Generated summary, if the stage succeeded
    pub summary: Option<String>,
    /// Video-level tags attached during the run
    pub tags: Vec<String>,
    /// Scenes created during the run
    pub scenes: Vec<SceneReport>,
    /// Error message when the run failed
    pub error: Option<String>,
}

impl VideoTaggingReport {
    fn new(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            status: MediaStatus::Processing,
            summary: None,
            tags: Vec::new(),
            scenes: Vec::new(),
            error: None,
        }
    }
}

/// Result payload of an image tagging run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTaggingReport {
    /// Image ID
    pub image_id: String,
    /// Final lifecycle status
    pub status: MediaStatus,
    /// Generated description, if the stage succeeded
    pub description: Option<String>,
    /// Tags attached during the run
    pub tags: Vec<String>,
    /// Error message when the run failed
    pub error: Option<String>,
}

impl ImageTaggingReport {
    fn new(image_id: &str) -> Self {
        Self {
            image_id: image_id.to_string(),
            status: MediaStatus::Processing,
            description: None,
            tags: Vec::new(),
            error: None,
        }
    }
}

// =============================================================================
// Degradation Boundary
// =============================================================================

/// Applies the per-stage failure policy.
///
/// Recoverable failures (upstream, extraction, timeouts) are logged and
/// collapse to `None` so the stage degrades; store failures pass through and
/// end the run.
pub(crate) fn degrade<T>(result: CoreResult<T>, stage: &str) -> CoreResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal_for_pipeline() => Err(e),
        Err(e) => {
            warn!("Stage '{}' degraded: {}", stage, e);
            Ok(None)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::core::ai::{GenerationClient, GenerationProvider};
    use crate::core::frames::FrameExtractor;
    use crate::core::CoreError;
    use crate::core::scenes::{SceneDetector, SceneRange};
    use crate::core::settings::TaggingSettings;
    use crate::core::store::{Database, Image, Provenance, TagOwner, Video};

    // -------------------------------------------------------------------------
    // Fakes
    // -------------------------------------------------------------------------

    /// Generator fake that routes on prompt content
    struct FakeGenerator {
        summary: CoreResult<String>,
        scene_replies: Mutex<Vec<String>>,
        video_tags: String,
        image_description: String,
        image_tags: String,
    }

    impl Default for FakeGenerator {
        fn default() -> Self {
            Self {
                summary: Ok("A trip to the coast.".to_string()),
                scene_replies: Mutex::new(Vec::new()),
                video_tags: "travel\nvacation".to_string(),
                image_description: "A cat sleeping on a sofa.".to_string(),
                image_tags: "cat\nsofa\nindoor".to_string(),
            }
        }
    }

    impl FakeGenerator {
        fn with_scene_replies(replies: &[&str]) -> Self {
            Self {
                scene_replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                ..Default::default()
            }
        }

        fn reply_for(&self, prompt: &str) -> CoreResult<String> {
            if prompt.contains("Scene range:") {
                let mut replies = self.scene_replies.lock().unwrap();
                return Ok(replies.pop().unwrap_or_default());
            }
            if prompt.contains("generate 3-10 relevant tags") {
                return Ok(self.video_tags.clone());
            }
            if prompt.contains("generate 5-15 relevant tags") {
                return Ok(self.image_tags.clone());
            }
            if prompt.contains("describe its content") {
                return Ok(self.image_description.clone());
            }
            match &self.summary {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(CoreError::Upstream(e.to_string())),
            }
        }
    }

    #[async_trait]
    impl GenerationProvider for FakeGenerator {
        fn name(&self) -> &str {
            "fake"
        }

        async fn generate(&self, prompt: &str) -> CoreResult<String> {
            self.reply_for(prompt)
        }

        async fn generate_with_media(
            &self,
            prompt: &str,
            _media: &[PathBuf],
        ) -> CoreResult<String> {
            self.reply_for(prompt)
        }
    }

    /// Generator fake that always fails with an upstream error
    struct DownGenerator;

    #[async_trait]
    impl GenerationProvider for DownGenerator {
        fn name(&self) -> &str {
            "down"
        }

        async fn generate(&self, _prompt: &str) -> CoreResult<String> {
            Err(CoreError::Upstream("service unavailable".to_string()))
        }

        async fn generate_with_media(
            &self,
            _prompt: &str,
            _media: &[PathBuf],
        ) -> CoreResult<String> {
            Err(CoreError::Upstream("service unavailable".to_string()))
        }
    }

    /// Generator fake that fails like a broken store, which is fatal
    struct FatalGenerator;

    #[async_trait]
    impl GenerationProvider for FatalGenerator {
        fn name(&self) -> &str {
            "fatal"
        }

        async fn generate(&self, _prompt: &str) -> CoreResult<String> {
            Err(CoreError::Database("disk I/O error".to_string()))
        }

        async fn generate_with_media(
            &self,
            _prompt: &str,
            _media: &[PathBuf],
        ) -> CoreResult<String> {
            Err(CoreError::Database("disk I/O error".to_string()))
        }
    }

    /// Detector fake returning configured ranges
    struct FakeDetector {
        ranges: CoreResult<Vec<SceneRange>>,
    }

    impl FakeDetector {
        fn with_ranges(ranges: Vec<SceneRange>) -> Self {
            Self { ranges: Ok(ranges) }
        }

        fn failing() -> Self {
            Self {
                ranges: Err(CoreError::Extraction("detector crashed".to_string())),
            }
        }
    }

    #[async_trait]
    impl SceneDetector for FakeDetector {
        async fn segment(&self, _media_path: &Path) -> CoreResult<Vec<SceneRange>> {
            match &self.ranges {
                Ok(r) => Ok(r.clone()),
                Err(e) => Err(CoreError::Extraction(e.to_string())),
            }
        }
    }

    /// Extractor fake writing stub frames; optionally fails every call
    struct FakeExtractor {
        fail: bool,
        duration: f64,
    }

    impl Default for FakeExtractor {
        fn default() -> Self {
            Self {
                fail: false,
                duration: 30.0,
            }
        }
    }

    #[async_trait]
    impl FrameExtractor for FakeExtractor {
        async fn extract_frame(
            &self,
            _input: &Path,
            _time_sec: TimeSec,
            output: &Path,
        ) -> CoreResult<()> {
            if self.fail {
                return Err(CoreError::Extraction("no such frame".to_string()));
            }
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(output, b"jpeg")?;
            Ok(())
        }

        async fn probe_duration(&self, _input: &Path) -> CoreResult<TimeSec> {
            if self.fail {
                return Err(CoreError::Probe("no such file".to_string()));
            }
            Ok(self.duration)
        }
    }

    // -------------------------------------------------------------------------
    // Harness
    // -------------------------------------------------------------------------

    struct Harness {
        db: Database,
        dir: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                db: Database::in_memory().unwrap(),
                dir: tempfile::TempDir::new().unwrap(),
            }
        }

        fn video(&self, duration: f64) -> Video {
            let video = Video::new("trip.mp4", "/media/trip.mp4").with_duration(duration);
            self.db.insert_video(&video).unwrap();
            video
        }

        fn video_pipeline(
            &self,
            generator: impl GenerationProvider + 'static,
            detector: FakeDetector,
            extractor: FakeExtractor,
        ) -> VideoTaggingPipeline {
            VideoTaggingPipeline::new(
                self.db.clone(),
                GenerationClient::new(Arc::new(generator)),
                Arc::new(detector),
                Arc::new(extractor),
                TaggingSettings::default(),
                self.dir.path().to_path_buf(),
            )
        }

        fn image_pipeline(
            &self,
            generator: impl GenerationProvider + 'static,
        ) -> ImageTaggingPipeline {
            ImageTaggingPipeline::new(
                self.db.clone(),
                GenerationClient::new(Arc::new(generator)),
                TaggingSettings::default(),
            )
        }
    }

    fn three_ranges() -> Vec<SceneRange> {
        vec![
            SceneRange::new(0.0, 10.0),
            SceneRange::new(10.0, 20.0),
            SceneRange::new(20.0, 30.0),
        ]
    }

    // -------------------------------------------------------------------------
    // Video Pipeline Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_video_run_happy_path() {
        let h = Harness::new();
        let video = h.video(30.0);
        let generator =
            FakeGenerator::with_scene_replies(&["beach\nsand", "beach\nwaves", "dunes"]);
        let pipeline = h.video_pipeline(
            generator,
            FakeDetector::with_ranges(three_ranges()),
            FakeExtractor::default(),
        );

        let report = pipeline.run(&video.id).await.unwrap();

        assert_eq!(report.status, MediaStatus::Tagged);
        assert_eq!(report.summary.as_deref(), Some("A trip to the coast."));
        assert_eq!(report.scenes.len(), 3);
        assert_eq!(report.scenes[0].tags, vec!["beach", "sand"]);
        assert!(report.scenes[0].thumbnail_path.is_some());

        let loaded = h.db.get_video(&video.id).unwrap();
        assert_eq!(loaded.status, MediaStatus::Tagged);
        assert_eq!(loaded.summary.as_deref(), Some("A trip to the coast."));
    }

    #[tokio::test]
    async fn test_video_scenes_ordered_by_start_time() {
        let h = Harness::new();
        let video = h.video(30.0);
        let generator = FakeGenerator::with_scene_replies(&["a", "b", "c"]);
        // Detector returns ranges out of order; storage orders them
        let pipeline = h.video_pipeline(
            generator,
            FakeDetector::with_ranges(vec![
                SceneRange::new(20.0, 30.0),
                SceneRange::new(0.0, 10.0),
                SceneRange::new(10.0, 20.0),
            ]),
            FakeExtractor::default(),
        );

        pipeline.run(&video.id).await.unwrap();

        let scenes = h.db.list_scenes(&video.id).unwrap();
        assert_eq!(scenes[0].start_sec, 0.0);
        assert_eq!(scenes[1].start_sec, 10.0);
        assert_eq!(scenes[2].start_sec, 20.0);
    }

    #[tokio::test]
    async fn test_aggregation_promotes_frequent_tags() {
        let h = Harness::new();
        let video = h.video(30.0);
        // "beach" appears in 2 of 3 scenes, "dunes" in only 1
        let generator =
            FakeGenerator::with_scene_replies(&["beach\nsand", "beach\nwaves", "dunes"]);
        let pipeline = h.video_pipeline(
            generator,
            FakeDetector::with_ranges(three_ranges()),
            FakeExtractor::default(),
        );

        let report = pipeline.run(&video.id).await.unwrap();

        assert!(report.tags.contains(&"beach".to_string()));
        assert!(!report.tags.contains(&"dunes".to_string()));

        let video_tags = h.db.list_tag_names(TagOwner::Video(&video.id)).unwrap();
        assert!(video_tags.contains(&"beach".to_string()));
        assert!(!video_tags.contains(&"dunes".to_string()));
    }

    #[tokio::test]
    async fn test_aggregation_single_scene_threshold_is_one() {
        let h = Harness::new();
        let video = h.video(30.0);
        let generator = FakeGenerator::with_scene_replies(&["harbor\nboats"]);
        let pipeline = h.video_pipeline(
            generator,
            FakeDetector::with_ranges(vec![SceneRange::new(0.0, 30.0)]),
            FakeExtractor::default(),
        );

        let report = pipeline.run(&video.id).await.unwrap();

        assert!(report.tags.contains(&"harbor".to_string()));
        assert!(report.tags.contains(&"boats".to_string()));
    }

    #[tokio::test]
    async fn test_general_tags_appended_without_duplicates() {
        let h = Harness::new();
        let video = h.video(30.0);
        let mut generator = FakeGenerator::with_scene_replies(&["travel\nbeach"]);
        // "travel" is both aggregated and generated; it must appear once
        generator.video_tags = "travel\nsummer".to_string();
        let pipeline = h.video_pipeline(
            generator,
            FakeDetector::with_ranges(vec![SceneRange::new(0.0, 30.0)]),
            FakeExtractor::default(),
        );

        let report = pipeline.run(&video.id).await.unwrap();

        let travel_count = report.tags.iter().filter(|t| *t == "travel").count();
        assert_eq!(travel_count, 1);
        assert!(report.tags.contains(&"summer".to_string()));
    }

    #[tokio::test]
    async fn test_detector_failure_falls_back_to_single_scene() {
        let h = Harness::new();
        let video = h.video(30.0);
        let generator = FakeGenerator::with_scene_replies(&["coast"]);
        let pipeline = h.video_pipeline(
            generator,
            FakeDetector::failing(),
            FakeExtractor::default(),
        );

        let report = pipeline.run(&video.id).await.unwrap();

        assert_eq!(report.status, MediaStatus::Tagged);
        assert_eq!(report.scenes.len(), 1);
        assert_eq!(report.scenes[0].start_sec, 0.0);
        assert_eq!(report.scenes[0].end_sec, 30.0);
    }

    #[tokio::test]
    async fn test_empty_detection_falls_back_to_single_scene() {
        let h = Harness::new();
        let video = h.video(30.0);
        let generator = FakeGenerator::with_scene_replies(&["coast"]);
        let pipeline = h.video_pipeline(
            generator,
            FakeDetector::with_ranges(Vec::new()),
            FakeExtractor::default(),
        );

        let report = pipeline.run(&video.id).await.unwrap();
        assert_eq!(report.scenes.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_media_degrades_but_ends_tagged() {
        let h = Harness::new();
        // No stored duration, detector and extractor both fail as they
        // would for a missing file
        let video = Video::new("gone.mp4", "/media/gone.mp4");
        h.db.insert_video(&video).unwrap();

        let pipeline = h.video_pipeline(
            FakeGenerator::default(),
            FakeDetector::failing(),
            FakeExtractor {
                fail: true,
                duration: 0.0,
            },
        );

        let report = pipeline.run(&video.id).await.unwrap();

        // Text-only summary still succeeds; scenes are absent entirely
        assert_eq!(report.status, MediaStatus::Tagged);
        assert!(report.scenes.is_empty());
        assert_eq!(
            h.db.get_video(&video.id).unwrap().status,
            MediaStatus::Tagged
        );
    }

    #[tokio::test]
    async fn test_generation_outage_degrades_but_ends_tagged() {
        let h = Harness::new();
        let video = h.video(30.0);
        let pipeline = h.video_pipeline(
            DownGenerator,
            FakeDetector::with_ranges(three_ranges()),
            FakeExtractor::default(),
        );

        let report = pipeline.run(&video.id).await.unwrap();

        assert_eq!(report.status, MediaStatus::Tagged);
        assert!(report.summary.is_none());
        assert!(report.tags.is_empty());
        assert_eq!(report.scenes.len(), 3);
        assert!(report.scenes.iter().all(|s| s.tags.is_empty()));
    }

    #[tokio::test]
    async fn test_fatal_error_sets_error_status_and_keeps_partials() {
        let h = Harness::new();
        let video = h.video(30.0);
        let pipeline = h.video_pipeline(
            FatalGenerator,
            FakeDetector::with_ranges(three_ranges()),
            FakeExtractor::default(),
        );

        let report = pipeline.run(&video.id).await.unwrap();

        assert_eq!(report.status, MediaStatus::Error);
        assert!(report.error.as_deref().unwrap().contains("disk I/O error"));

        let loaded = h.db.get_video(&video.id).unwrap();
        assert_eq!(loaded.status, MediaStatus::Error);
        assert!(loaded.error.is_some());
    }

    #[tokio::test]
    async fn test_run_unknown_video_is_not_found() {
        let h = Harness::new();
        let pipeline = h.video_pipeline(
            FakeGenerator::default(),
            FakeDetector::with_ranges(Vec::new()),
            FakeExtractor::default(),
        );

        let result = pipeline.run("missing").await;
        assert!(matches!(result, Err(CoreError::VideoNotFound(_))));
    }

    // -------------------------------------------------------------------------
    // Re-tagging Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_retag_preserves_user_tags_replaces_generated() {
        let h = Harness::new();
        let video = h.video(30.0);

        // First run
        let generator = FakeGenerator::with_scene_replies(&["old-a\nold-b"]);
        let pipeline = h.video_pipeline(
            generator,
            FakeDetector::with_ranges(vec![SceneRange::new(0.0, 30.0)]),
            FakeExtractor::default(),
        );
        pipeline.run(&video.id).await.unwrap();

        // User pins a tag between runs
        let favorite = h.db.find_or_create_tag("favorite").unwrap();
        h.db.attach(
            TagOwner::Video(&video.id),
            &favorite.id,
            Provenance::UserDefined,
        )
        .unwrap();

        let old_scene_ids: Vec<String> = h
            .db
            .list_scenes(&video.id)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();

        // Second run with fresh output
        let generator = FakeGenerator::with_scene_replies(&["new-a\nnew-b"]);
        let pipeline = h.video_pipeline(
            generator,
            FakeDetector::with_ranges(vec![SceneRange::new(0.0, 30.0)]),
            FakeExtractor::default(),
        );
        let report = pipeline.run(&video.id).await.unwrap();
        assert_eq!(report.status, MediaStatus::Tagged);

        let names = h.db.list_tag_names(TagOwner::Video(&video.id)).unwrap();
        assert!(names.contains(&"favorite".to_string()));
        assert!(!names.contains(&"old-a".to_string()));
        assert!(!names.contains(&"old-b".to_string()));
        assert!(names.contains(&"new-a".to_string()));

        // All prior scenes were removed and replaced
        let new_scene_ids: Vec<String> = h
            .db
            .list_scenes(&video.id)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(new_scene_ids.len(), 1);
        assert!(old_scene_ids.iter().all(|id| !new_scene_ids.contains(id)));
    }

    #[tokio::test]
    async fn test_error_status_accepts_fresh_run() {
        let h = Harness::new();
        let video = h.video(30.0);

        // Failed run
        let pipeline = h.video_pipeline(
            FatalGenerator,
            FakeDetector::with_ranges(vec![SceneRange::new(0.0, 30.0)]),
            FakeExtractor::default(),
        );
        let report = pipeline.run(&video.id).await.unwrap();
        assert_eq!(report.status, MediaStatus::Error);

        // Fresh run succeeds
        let generator = FakeGenerator::with_scene_replies(&["coast"]);
        let pipeline = h.video_pipeline(
            generator,
            FakeDetector::with_ranges(vec![SceneRange::new(0.0, 30.0)]),
            FakeExtractor::default(),
        );
        let report = pipeline.run(&video.id).await.unwrap();
        assert_eq!(report.status, MediaStatus::Tagged);

        let loaded = h.db.get_video(&video.id).unwrap();
        assert_eq!(loaded.status, MediaStatus::Tagged);
        assert!(loaded.error.is_none());
    }

    // -------------------------------------------------------------------------
    // Scene Description Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_describe_scene() {
        let h = Harness::new();
        let video = h.video(30.0);
        let generator = FakeGenerator::with_scene_replies(&["coast"]);
        let pipeline = h.video_pipeline(
            generator,
            FakeDetector::with_ranges(vec![SceneRange::new(0.0, 30.0)]),
            FakeExtractor::default(),
        );
        pipeline.run(&video.id).await.unwrap();

        let scene = &h.db.list_scenes(&video.id).unwrap()[0];
        let description = pipeline.describe_scene(&scene.id).await.unwrap();
        assert_eq!(description, "A trip to the coast.");
    }

    // -------------------------------------------------------------------------
    // Image Pipeline Tests
    // -------------------------------------------------------------------------

    fn insert_image(h: &Harness, on_disk: bool) -> Image {
        let path = h.dir.path().join("cat.jpg");
        if on_disk {
            std::fs::write(&path, b"jpeg").unwrap();
        }
        let image = Image::new("cat.jpg", &path.to_string_lossy());
        h.db.insert_image(&image).unwrap();
        image
    }

    #[tokio::test]
    async fn test_image_run_happy_path() {
        let h = Harness::new();
        let image = insert_image(&h, true);
        let pipeline = h.image_pipeline(FakeGenerator::default());

        let report = pipeline.run(&image.id).await.unwrap();

        assert_eq!(report.status, MediaStatus::Tagged);
        assert_eq!(
            report.description.as_deref(),
            Some("A cat sleeping on a sofa.")
        );
        assert_eq!(report.tags, vec!["cat", "sofa", "indoor"]);

        let loaded = h.db.get_image(&image.id).unwrap();
        assert_eq!(loaded.status, MediaStatus::Tagged);
        assert_eq!(
            loaded.description.as_deref(),
            Some("A cat sleeping on a sofa.")
        );
    }

    #[tokio::test]
    async fn test_image_missing_file_degrades_but_ends_tagged() {
        let h = Harness::new();
        let image = insert_image(&h, false);
        let pipeline = h.image_pipeline(FakeGenerator::default());

        let report = pipeline.run(&image.id).await.unwrap();

        assert_eq!(report.status, MediaStatus::Tagged);
        assert!(report.description.is_none());
        assert!(report.tags.is_empty());
    }

    #[tokio::test]
    async fn test_image_retag_preserves_user_tags() {
        let h = Harness::new();
        let image = insert_image(&h, true);
        let pipeline = h.image_pipeline(FakeGenerator::default());
        pipeline.run(&image.id).await.unwrap();

        let pinned = h.db.find_or_create_tag("pinned").unwrap();
        h.db.attach(
            TagOwner::Image(&image.id),
            &pinned.id,
            Provenance::UserDefined,
        )
        .unwrap();

        pipeline.run(&image.id).await.unwrap();

        let names = h.db.list_tag_names(TagOwner::Image(&image.id)).unwrap();
        assert!(names.contains(&"pinned".to_string()));
        assert!(names.contains(&"cat".to_string()));
    }

    #[tokio::test]
    async fn test_image_fatal_error_sets_error_status() {
        let h = Harness::new();
        let image = insert_image(&h, true);
        let pipeline = h.image_pipeline(FatalGenerator);

        let report = pipeline.run(&image.id).await.unwrap();

        assert_eq!(report.status, MediaStatus::Error);
        assert!(report.error.is_some());
        assert_eq!(
            h.db.get_image(&image.id).unwrap().status,
            MediaStatus::Error
        );
    }
}
