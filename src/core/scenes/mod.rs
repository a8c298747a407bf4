//! Scene Segmentation Module
//!
//! Detects content changes in video files and produces ordered time ranges.
//! Wraps FFmpeg's scene filter; the pipeline treats a failed or empty
//! detection as "whole file is one scene", so segmentation is never fatal.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::ffmpeg::FFmpegRunner;
use crate::core::{CoreError, CoreResult, TimeSec};

// =============================================================================
// Scene Range
// =============================================================================

/// A contiguous time range produced by segmentation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRange {
    /// Start time in seconds
    pub start_sec: TimeSec,
    /// End time in seconds
    pub end_sec: TimeSec,
}

impl SceneRange {
    /// Creates a new range
    pub fn new(start_sec: TimeSec, end_sec: TimeSec) -> Self {
        Self { start_sec, end_sec }
    }

    /// Returns the duration of the range in seconds
    pub fn duration(&self) -> TimeSec {
        self.end_sec - self.start_sec
    }

    /// Returns the midpoint time of the range
    pub fn midpoint(&self) -> TimeSec {
        (self.start_sec + self.end_sec) / 2.0
    }
}

// =============================================================================
// Scene Detector Trait
// =============================================================================

/// Trait for content-change detectors
///
/// `segment` returns ordered ranges; an empty list is a valid "no cuts
/// found" response, distinct from an error.
#[async_trait]
pub trait SceneDetector: Send + Sync {
    /// Detects scene ranges in a media file
    async fn segment(&self, media_path: &Path) -> CoreResult<Vec<SceneRange>>;
}

// =============================================================================
// Detector Configuration
// =============================================================================

/// Configuration for FFmpeg-based scene detection
#[derive(Clone, Debug)]
pub struct SceneDetectorConfig {
    /// Scene change detection threshold (0.0 - 1.0)
    /// Lower values detect more scene changes
    pub threshold: f64,
    /// Minimum scene duration in seconds
    pub min_scene_duration: f64,
}

impl Default for SceneDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            min_scene_duration: 0.5,
        }
    }
}

impl From<&crate::core::settings::SceneSettings> for SceneDetectorConfig {
    fn from(settings: &crate::core::settings::SceneSettings) -> Self {
        Self {
            threshold: settings.threshold,
            min_scene_duration: settings.min_scene_duration,
        }
    }
}

// =============================================================================
// FFmpeg Scene Detector
// =============================================================================

/// Detects scenes using FFmpeg's scene-score filter
pub struct FfmpegSceneDetector {
    runner: FFmpegRunner,
    config: SceneDetectorConfig,
}

impl FfmpegSceneDetector {
    /// Creates a detector with default configuration
    pub fn new(runner: FFmpegRunner) -> Self {
        Self {
            runner,
            config: SceneDetectorConfig::default(),
        }
    }

    /// Creates a detector with custom configuration
    pub fn with_config(runner: FFmpegRunner, config: SceneDetectorConfig) -> Self {
        Self { runner, config }
    }

    /// Runs FFmpeg scene detection and returns cut timestamps
    async fn run_scene_detection(&self, path: &Path) -> CoreResult<Vec<f64>> {
        let output = tokio::process::Command::new(&self.runner.info().ffmpeg_path)
            .args([
                "-i",
                &path.to_string_lossy(),
                "-filter:v",
                &format!("select='gt(scene,{})',showinfo", self.config.threshold),
                "-f",
                "null",
                "-",
            ])
            .output()
            .await
            .map_err(|e| CoreError::Extraction(format!("Failed to run FFmpeg: {}", e)))?;

        // FFmpeg writes showinfo lines to stderr
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut timestamps = Vec::new();
        for line in stderr.lines() {
            if line.contains("pts_time:") {
                if let Some(time_str) = extract_pts_time(line) {
                    if let Ok(time) = time_str.parse::<f64>() {
                        timestamps.push(time);
                    }
                }
            }
        }

        timestamps.sort_by(|a, b| a.total_cmp(b));
        Ok(timestamps)
    }

    /// Builds ordered ranges from cut timestamps
    fn build_ranges(&self, cut_times: &[f64], total_duration: f64) -> Vec<SceneRange> {
        let mut boundaries: Vec<f64> = vec![0.0];
        boundaries.extend(cut_times.iter().copied());

        if boundaries
            .last()
            .map(|&t| t < total_duration)
            .unwrap_or(true)
        {
            boundaries.push(total_duration);
        }

        boundaries
            .windows(2)
            .filter(|w| w[1] - w[0] >= self.config.min_scene_duration)
            .map(|w| SceneRange::new(w[0], w[1]))
            .collect()
    }
}

#[async_trait]
impl SceneDetector for FfmpegSceneDetector {
    async fn segment(&self, media_path: &Path) -> CoreResult<Vec<SceneRange>> {
        if !media_path.exists() {
            return Err(CoreError::FileNotFound(
                media_path.to_string_lossy().to_string(),
            ));
        }

        let info = self.runner.probe(media_path).await?;
        let cut_times = self.run_scene_detection(media_path).await?;

        let ranges = self.build_ranges(&cut_times, info.duration_sec);
        debug!(
            "Detected {} scenes in {} ({} cuts)",
            ranges.len(),
            media_path.display(),
            cut_times.len()
        );

        Ok(ranges)
    }
}

/// Extracts the pts_time value from an FFmpeg showinfo line
fn extract_pts_time(line: &str) -> Option<&str> {
    let pts_marker = "pts_time:";
    let start = line.find(pts_marker)? + pts_marker.len();
    let rest = &line[start..];
    match rest.find(|c: char| !c.is_ascii_digit() && c != '.' && c != '-') {
        Some(end) => Some(&rest[..end]),
        None => Some(rest.trim()),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ffmpeg::FFmpegInfo;

    fn detector() -> FfmpegSceneDetector {
        let info = FFmpegInfo {
            ffmpeg_path: "ffmpeg".into(),
            ffprobe_path: "ffprobe".into(),
            version: "test".to_string(),
        };
        FfmpegSceneDetector::new(FFmpegRunner::new(info))
    }

    // -------------------------------------------------------------------------
    // Scene Range Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_range_duration_and_midpoint() {
        let range = SceneRange::new(2.0, 8.0);
        assert_eq!(range.duration(), 6.0);
        assert_eq!(range.midpoint(), 5.0);
    }

    // -------------------------------------------------------------------------
    // Range Building Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_build_ranges_from_cuts() {
        let detector = detector();
        let ranges = detector.build_ranges(&[2.0, 5.0, 8.0], 10.0);

        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0], SceneRange::new(0.0, 2.0));
        assert_eq!(ranges[1], SceneRange::new(2.0, 5.0));
        assert_eq!(ranges[2], SceneRange::new(5.0, 8.0));
        assert_eq!(ranges[3], SceneRange::new(8.0, 10.0));
    }

    #[test]
    fn test_build_ranges_no_cuts_is_single_range() {
        let detector = detector();
        let ranges = detector.build_ranges(&[], 10.0);

        assert_eq!(ranges, vec![SceneRange::new(0.0, 10.0)]);
    }

    #[test]
    fn test_build_ranges_filters_short_scenes() {
        let info = FFmpegInfo {
            ffmpeg_path: "ffmpeg".into(),
            ffprobe_path: "ffprobe".into(),
            version: "test".to_string(),
        };
        let detector = FfmpegSceneDetector::with_config(
            FFmpegRunner::new(info),
            SceneDetectorConfig {
                min_scene_duration: 2.0,
                ..Default::default()
            },
        );

        let ranges = detector.build_ranges(&[1.0, 2.5, 3.0], 10.0);
        assert!(ranges.iter().all(|r| r.duration() >= 2.0));
    }

    #[test]
    fn test_build_ranges_zero_duration_is_empty() {
        let detector = detector();
        let ranges = detector.build_ranges(&[], 0.0);
        assert!(ranges.is_empty());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = crate::core::settings::SceneSettings {
            threshold: 0.5,
            min_scene_duration: 1.5,
        };
        let config = SceneDetectorConfig::from(&settings);
        assert_eq!(config.threshold, 0.5);
        assert_eq!(config.min_scene_duration, 1.5);
    }

    // -------------------------------------------------------------------------
    // Parsing Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_pts_time() {
        let line = "[Parsed_showinfo_1 @ 0x...] n:  42 pts:   125000 pts_time:5.208333 pos:12345";
        assert_eq!(extract_pts_time(line), Some("5.208333"));
    }

    #[test]
    fn test_extract_pts_time_no_match() {
        assert!(extract_pts_time("some other log line").is_none());
    }

    // -------------------------------------------------------------------------
    // Detector Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_segment_file_not_found() {
        let detector = detector();
        let result = detector.segment(Path::new("/nonexistent/video.mp4")).await;
        assert!(matches!(result, Err(CoreError::FileNotFound(_))));
    }
}
