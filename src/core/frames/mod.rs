//! Frame Sampling Module
//!
//! Computes sample timestamps for a time range given a frame budget and
//! drives the external frame-extraction tool. Individual extraction failures
//! are logged and skipped; the sampler never fails wholesale because one
//! frame failed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::core::ffmpeg::FFmpegRunner;
use crate::core::{CoreResult, TimeSec};

// =============================================================================
// Timestamp Math
// =============================================================================

/// Computes evenly distributed sample timestamps inside `(start, end)`.
///
/// Frame count is `min(budget, max(1, floor(duration / 2)))`: at least one
/// frame per two seconds of material, never more than the budget. A single
/// frame lands on the midpoint; `n` frames land at
/// `start + k * duration / (n + 1)` for `k = 1..n`, keeping samples off the
/// exact boundaries.
pub fn sample_timestamps(start: TimeSec, end: TimeSec, budget: u32) -> Vec<TimeSec> {
    let duration = end - start;
    if duration <= 0.0 || budget == 0 {
        return Vec::new();
    }

    let n = (budget as usize).min(((duration / 2.0).floor() as usize).max(1));

    if n == 1 {
        return vec![start + duration / 2.0];
    }

    (1..=n)
        .map(|k| start + k as f64 * duration / (n as f64 + 1.0))
        .collect()
}

// =============================================================================
// Frame Extractor Trait
// =============================================================================

/// Trait for the external frame-extraction tool
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Extracts one frame of `input` at `time_sec` into `output`
    async fn extract_frame(&self, input: &Path, time_sec: TimeSec, output: &Path)
        -> CoreResult<()>;

    /// Probes the duration of `input` in seconds
    async fn probe_duration(&self, input: &Path) -> CoreResult<TimeSec>;
}

/// Frame extractor backed by the FFmpeg runner
pub struct FfmpegFrameExtractor {
    runner: FFmpegRunner,
}

impl FfmpegFrameExtractor {
    /// Creates an extractor over a runner
    pub fn new(runner: FFmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frame(
        &self,
        input: &Path,
        time_sec: TimeSec,
        output: &Path,
    ) -> CoreResult<()> {
        self.runner
            .extract_frame(input, time_sec, output)
            .await
            .map_err(Into::into)
    }

    async fn probe_duration(&self, input: &Path) -> CoreResult<TimeSec> {
        let info = self.runner.probe(input).await?;
        Ok(info.duration_sec)
    }
}

// =============================================================================
// Frame Sampler
// =============================================================================

/// Samples frames from a media file through an injected extractor
pub struct FrameSampler<'a> {
    extractor: &'a dyn FrameExtractor,
}

impl<'a> FrameSampler<'a> {
    /// Creates a sampler over an extractor
    pub fn new(extractor: &'a dyn FrameExtractor) -> Self {
        Self { extractor }
    }

    /// Extracts up to `budget` frames from `(start, end)` of `input`.
    ///
    /// Output files are named `{prefix}_frame_{k}.jpg` inside `output_dir`.
    /// Returns the paths of successfully extracted frames; failures are
    /// logged per frame and omitted.
    pub async fn extract_range(
        &self,
        input: &Path,
        start: TimeSec,
        end: TimeSec,
        budget: u32,
        output_dir: &Path,
        prefix: &str,
    ) -> Vec<PathBuf> {
        let mut frames = Vec::new();

        for (i, time_sec) in sample_timestamps(start, end, budget).into_iter().enumerate() {
            let output = output_dir.join(format!("{}_frame_{}.jpg", prefix, i));
            match self.extractor.extract_frame(input, time_sec, &output).await {
                Ok(()) => frames.push(output),
                Err(e) => {
                    warn!("Could not extract frame at {:.1}s: {}", time_sec, e);
                }
            }
        }

        frames
    }
}

// =============================================================================
// Tests
// =============================================================================
