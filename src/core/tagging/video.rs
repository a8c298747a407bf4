//! Video Tagging Pipeline
//!
//! Drives the full tagging workflow for one video: summary generation,
//! scene segmentation, per-scene tagging, aggregation, and general tags.
//!
//! Failure policy, stage by stage: generation, segmentation, probing, and
//! frame/thumbnail extraction failures are caught at their stage boundary
//! and degrade the result (absent summary, fewer scenes, fewer tags). Store
//! failures propagate to the top-level handler, which flips the video to
//! `error` and captures the message in the report. `run` never returns a
//! stage error to the caller; its only `Err` is an unknown video id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::ai::GenerationClient;
use crate::core::frames::{FrameExtractor, FrameSampler};
use crate::core::scenes::{SceneDetector, SceneRange};
use crate::core::settings::TaggingSettings;
use crate::core::store::{Database, Provenance, Scene, TagOwner, Video};
use crate::core::{CoreResult, MediaStatus};

use super::context;
use super::{degrade, SceneReport, VideoTaggingReport};

/// Fixed positions for summary frames, as fractions of the duration
const SUMMARY_FRAME_RATIOS: [f64; 3] = [0.25, 0.5, 0.75];

/// Tags promoted from scenes to the video level, at most
const AGGREGATE_PROMOTE_LIMIT: usize = 10;

// =============================================================================
// Pipeline
// =============================================================================

/// Orchestrates tagging runs for videos
///
/// Collaborators are injected: the generation client, the scene detector,
/// and the frame extractor can all be substituted with fakes in tests.
pub struct VideoTaggingPipeline {
    db: Database,
    generator: GenerationClient,
    detector: Arc<dyn SceneDetector>,
    extractor: Arc<dyn FrameExtractor>,
    settings: TaggingSettings,
    thumbnails_dir: PathBuf,
}

impl VideoTaggingPipeline {
    /// Creates a pipeline over its collaborators
    pub fn new(
        db: Database,
        generator: GenerationClient,
        detector: Arc<dyn SceneDetector>,
        extractor: Arc<dyn FrameExtractor>,
        settings: TaggingSettings,
        thumbnails_dir: PathBuf,
    ) -> Self {
        Self {
            db,
            generator,
            detector,
            extractor,
            settings,
            thumbnails_dir,
        }
    }

    /// Runs the full tagging workflow for a video.
    ///
    /// Returns `Err` only when the video id is unknown. Every other failure
    /// is captured in the report: degraded stages leave gaps, store failures
    /// end the run with status `error` and a message. Partial results
    /// committed before a failure are retained.
    pub async fn run(&self, video_id: &str) -> CoreResult<VideoTaggingReport> {
        let video = self.db.get_video(video_id)?;
        info!("Starting tagging run for video {}", video.filename);

        // Re-tagging replaces prior generated output, never user input
        if video.status == MediaStatus::Tagged {
            debug!("Re-tagging {}; clearing generated tags", video.filename);
            self.clear_previous(&video)?;
        }

        self.db
            .set_video_status(video_id, MediaStatus::Processing, None)?;

        let mut report = VideoTaggingReport::new(video_id);
        match self.run_stages(&video, &mut report).await {
            Ok(()) => {
                self.db
                    .set_video_status(video_id, MediaStatus::Tagged, None)?;
                report.status = MediaStatus::Tagged;
                info!("Tagging complete for video {}", video.filename);
            }
            Err(e) => {
                warn!("Tagging failed for video {}: {}", video.filename, e);
                let message = e.to_string();
                self.db
                    .set_video_status(video_id, MediaStatus::Error, Some(&message))?;
                report.status = MediaStatus::Error;
                report.error = Some(message);
            }
        }

        Ok(report)
    }

    /// Runs the stage sequence; any returned error is a store failure
    async fn run_stages(
        &self,
        video: &Video,
        report: &mut VideoTaggingReport,
    ) -> CoreResult<()> {
        // Summary
        report.summary = self.generate_summary(video).await?;

        // Segmentation
        let scenes = self.detect_and_save_scenes(video).await?;
        for scene in &scenes {
            report.scenes.push(SceneReport {
                id: scene.id.clone(),
                start_sec: scene.start_sec,
                end_sec: scene.end_sec,
                thumbnail_path: scene.thumbnail_path.clone(),
                tags: Vec::new(),
            });
        }

        // Per-scene tagging, in ascending start-time order
        for (i, scene) in scenes.iter().enumerate() {
            debug!(
                "Tagging scene {}/{} ({:.1}s - {:.1}s)",
                i + 1,
                scenes.len(),
                scene.start_sec,
                scene.end_sec
            );
            let tags = self.tag_scene(video, scene, report.summary.as_deref()).await?;
            report.scenes[i].tags = tags;
        }

        // Aggregate frequent scene tags to the video level
        report.tags = self.aggregate_scene_tags(video, &scenes)?;

        // Independent general tags
        let general = self.generate_video_tags(video, report.summary.as_deref()).await?;
        for name in general {
            if !report.tags.contains(&name) {
                report.tags.push(name);
            }
        }

        Ok(())
    }

    // =========================================================================
    // Re-tagging Cleanup
    // =========================================================================

    /// Clears generated output from a prior run.
    ///
    /// Video-level user tags survive. Scene rows are deleted outright, so
    /// scene-level user tags are lost with their scenes, since the new
    /// segmentation has no stable mapping to the old scenes.
    fn clear_previous(&self, video: &Video) -> CoreResult<()> {
        for scene in self.db.list_scenes(&video.id)? {
            self.db.clear_generated(TagOwner::Scene(&scene.id))?;
        }
        self.db.clear_generated(TagOwner::Video(&video.id))?;
        let deleted = self.db.delete_video_scenes(&video.id)?;
        debug!("Removed {} prior scenes for {}", deleted, video.filename);
        Ok(())
    }

    // =========================================================================
    // Summary Stage
    // =========================================================================

    /// Generates and stores the video summary; absent on degraded failure
    async fn generate_summary(&self, video: &Video) -> CoreResult<Option<String>> {
        let frames = self.extract_summary_frames(video).await;

        let prompt = context::summary_prompt(&video.filename, video.duration_sec, !frames.is_empty());
        let result = if frames.is_empty() {
            self.generator.generate(&prompt).await
        } else {
            self.generator.generate_with_media(&prompt, &frames).await
        };

        let Some(text) = degrade(result, "summary generation")? else {
            return Ok(None);
        };

        let summary = text.trim().to_string();
        if summary.is_empty() {
            return Ok(None);
        }

        self.db.set_video_summary(&video.id, &summary)?;
        Ok(Some(summary))
    }

    /// Extracts summary frames at fixed fractions of the duration
    async fn extract_summary_frames(&self, video: &Video) -> Vec<PathBuf> {
        let duration = video.duration_sec.unwrap_or(60.0);
        let input = Path::new(&video.file_path);
        let dir = self.thumbnails_dir.join(&video.id);

        let mut frames = Vec::new();
        for (i, ratio) in SUMMARY_FRAME_RATIOS.iter().enumerate() {
            let time_sec = (duration * ratio).max(1.0);
            let output = dir.join(format!("summary_frame_{}.jpg", i));
            match self.extractor.extract_frame(input, time_sec, &output).await {
                Ok(()) => frames.push(output),
                Err(e) => {
                    warn!("Could not extract summary frame at {:.1}s: {}", time_sec, e);
                }
            }
        }
        frames
    }

    // =========================================================================
    // Segmentation Stage
    // =========================================================================

    /// Detects scenes, stores them, and extracts one thumbnail per scene.
    ///
    /// Detector failure or an empty detection falls back to treating the
    /// whole duration as a single scene; with no known duration the video
    /// simply gets no scenes.
    async fn detect_and_save_scenes(&self, video: &Video) -> CoreResult<Vec<Scene>> {
        let input = Path::new(&video.file_path);

        let mut ranges = match degrade(self.detector.segment(input).await, "scene detection")? {
            Some(ranges) if !ranges.is_empty() => ranges,
            _ => self.fallback_range(video).await.into_iter().collect(),
        };

        // Downstream stages rely on ascending start-time order
        ranges.sort_by(|a, b| a.start_sec.total_cmp(&b.start_sec));

        let dir = self.thumbnails_dir.join(&video.id);
        let mut scenes = Vec::new();

        for range in ranges {
            let mut scene = Scene::new(&video.id, range.start_sec, range.end_sec);
            self.db.insert_scene(&scene)?;

            // Representative thumbnail at the scene midpoint
            let thumb = dir.join(format!("scene_{}.jpg", scene.id));
            match self
                .extractor
                .extract_frame(input, scene.midpoint(), &thumb)
                .await
            {
                Ok(()) => {
                    let path = thumb.to_string_lossy().to_string();
                    self.db.set_scene_thumbnail(&scene.id, &path)?;
                    scene.thumbnail_path = Some(path);
                }
                Err(e) => {
                    warn!("Could not extract scene thumbnail: {}", e);
                }
            }

            scenes.push(scene);
        }

        info!("Created {} scenes for {}", scenes.len(), video.filename);
        Ok(scenes)
    }

    /// Whole-duration fallback range when detection yields nothing
    async fn fallback_range(&self, video: &Video) -> Option<SceneRange> {
        let duration = match video.duration_sec {
            Some(d) => d,
            None => {
                let input = Path::new(&video.file_path);
                match self.extractor.probe_duration(input).await {
                    Ok(d) => d,
                    Err(e) => {
                        warn!("Could not probe duration for {}: {}", video.filename, e);
                        return None;
                    }
                }
            }
        };

        (duration > 0.0).then(|| SceneRange::new(0.0, duration))
    }

    // =========================================================================
    // Per-Scene Tagging Stage
    // =========================================================================

    /// Generates and attaches tags for one scene; empty on degraded failure
    async fn tag_scene(
        &self,
        video: &Video,
        scene: &Scene,
        summary: Option<&str>,
    ) -> CoreResult<Vec<String>> {
        let input = Path::new(&video.file_path);
        let dir = self.thumbnails_dir.join(&video.id);

        let sampler = FrameSampler::new(self.extractor.as_ref());
        let frames = sampler
            .extract_range(
                input,
                scene.start_sec,
                scene.end_sec,
                self.settings.frames_per_scene,
                &dir,
                &format!("scene_{}", scene.id),
            )
            .await;

        let video_duration = video.duration_sec.unwrap_or(60.0);
        let position = context::position_label(scene.start_sec, video_duration);
        let scene_context = context::scene_context(
            &video.filename,
            summary,
            scene.start_sec,
            scene.end_sec,
            position,
        );

        let result = if frames.is_empty() {
            let prompt = context::scene_tags_text_prompt(&scene_context);
            self.generator
                .generate_tag_list(&prompt, self.settings.scene_tag_cap)
                .await
        } else {
            debug!("Analyzing scene with {} frames", frames.len());
            let prompt = context::scene_tags_vision_prompt(&scene_context);
            self.generator
                .generate_tag_list_with_media(&prompt, &frames, self.settings.scene_tag_cap)
                .await
        };

        let Some(names) = degrade(result, "scene tagging")? else {
            return Ok(Vec::new());
        };

        let mut attached = Vec::new();
        for name in names {
            let tag = self.db.find_or_create_tag(&name)?;
            if self
                .db
                .attach(TagOwner::Scene(&scene.id), &tag.id, Provenance::AiGenerated(None))?
            {
                attached.push(tag.name);
            }
        }

        Ok(attached)
    }

    // =========================================================================
    // Aggregation Stage
    // =========================================================================

    /// Promotes the most frequent scene tags to the video level.
    ///
    /// Promotion threshold is 1 when the video has at most two scenes,
    /// otherwise 2; at most the top ten by frequency are promoted.
    fn aggregate_scene_tags(&self, video: &Video, scenes: &[Scene]) -> CoreResult<Vec<String>> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for scene in scenes {
            for name in self.db.list_tag_names(TagOwner::Scene(&scene.id))? {
                *counts.entry(name).or_default() += 1;
            }
        }

        let min_count = if scenes.len() <= 2 { 1 } else { 2 };

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut promoted = Vec::new();
        for (name, count) in ranked {
            if promoted.len() == AGGREGATE_PROMOTE_LIMIT {
                break;
            }
            if count < min_count {
                continue;
            }
            if let Some(tag) = self.db.get_tag(&name)? {
                if self.db.attach(
                    TagOwner::Video(&video.id),
                    &tag.id,
                    Provenance::AiGenerated(None),
                )? {
                    promoted.push(name);
                }
            }
        }

        Ok(promoted)
    }

    // =========================================================================
    // General Video Tag Stage
    // =========================================================================

    /// Generates tags from the video's own context, independent of scenes
    async fn generate_video_tags(
        &self,
        video: &Video,
        summary: Option<&str>,
    ) -> CoreResult<Vec<String>> {
        let prompt = context::video_tags_prompt(&video.filename, summary, video.duration_sec);
        let result = self
            .generator
            .generate_tag_list(&prompt, self.settings.video_tag_cap)
            .await;

        let Some(names) = degrade(result, "video tagging")? else {
            return Ok(Vec::new());
        };

        let mut attached = Vec::new();
        for name in names {
            let tag = self.db.find_or_create_tag(&name)?;
            if self
                .db
                .attach(TagOwner::Video(&video.id), &tag.id, Provenance::AiGenerated(None))?
            {
                attached.push(tag.name);
            }
        }

        Ok(attached)
    }

    // =========================================================================
    // Scene Description
    // =========================================================================

    /// Describes one scene from freshly sampled frames.
    ///
    /// Direct operation for scene preview; upstream failures propagate to
    /// the caller, unlike pipeline stages.
    pub async fn describe_scene(&self, scene_id: &str) -> CoreResult<String> {
        let scene = self.db.get_scene(scene_id)?;
        let video = self.db.get_video(&scene.video_id)?;

        let input = Path::new(&video.file_path);
        let dir = self.thumbnails_dir.join(&video.id);
        let sampler = FrameSampler::new(self.extractor.as_ref());
        let frames = sampler
            .extract_range(
                input,
                scene.start_sec,
                scene.end_sec,
                self.settings.frames_per_scene,
                &dir,
                &format!("describe_{}", scene.id),
            )
            .await;

        let prompt = context::scene_description_prompt(&video.filename);
        let text = self.generator.generate_with_media(&prompt, &frames).await?;
        Ok(text.trim().to_string())
    }
}
