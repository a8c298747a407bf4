//! FFmpeg Runner Module
//!
//! Executes FFmpeg/FFprobe commands for the tagging pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{FFmpegError, FFmpegInfo, FFmpegResult};

// =============================================================================
// Media Info
// =============================================================================

/// Media information extracted by FFprobe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration_sec: f64,
    /// Container format
    pub format: String,
}

// =============================================================================
// FFmpeg Runner
// =============================================================================

/// Runs FFmpeg commands against detected binaries
#[derive(Clone)]
pub struct FFmpegRunner {
    info: FFmpegInfo,
}

impl FFmpegRunner {
    /// Creates a runner from detected FFmpeg info
    pub fn new(info: FFmpegInfo) -> Self {
        Self { info }
    }

    /// Returns the detected FFmpeg info
    pub fn info(&self) -> &FFmpegInfo {
        &self.info
    }

    /// Probes a media file for duration and format
    pub async fn probe(&self, input: &Path) -> FFmpegResult<MediaInfo> {
        if !input.exists() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }

        let output = tokio::process::Command::new(&self.info.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                &input.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(FFmpegError::ProcessError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ProbeError(format!(
                "FFprobe failed: {}",
                stderr
            )));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Extracts a single frame at the given time position.
    ///
    /// -ss before -i for fast seeking, -frames:v 1 for a single frame,
    /// -q:v 2 for good JPEG quality.
    pub async fn extract_frame(
        &self,
        input: &Path,
        time_sec: f64,
        output: &Path,
    ) -> FFmpegResult<()> {
        if !input.exists() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FFmpegError::OutputError(format!("Failed to create output directory: {}", e))
            })?;
        }

        let result = tokio::process::Command::new(&self.info.ffmpeg_path)
            .args([
                "-ss",
                &format!("{:.3}", time_sec),
                "-i",
                &input.to_string_lossy(),
                "-frames:v",
                "1",
                "-q:v",
                "2",
                "-y",
                &output.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(FFmpegError::ProcessError)?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(FFmpegError::ExecutionFailed(format!(
                "Frame extraction failed: {}",
                stderr
            )));
        }

        Ok(())
    }

    /// Extracts a clip between two time positions, re-encoding for accuracy.
    pub async fn extract_clip(
        &self,
        input: &Path,
        output: &Path,
        start_sec: f64,
        end_sec: f64,
    ) -> FFmpegResult<()> {
        if !input.exists() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }
        if end_sec <= start_sec {
            return Err(FFmpegError::InvalidInput(format!(
                "Invalid clip range: {:.3}~{:.3}",
                start_sec, end_sec
            )));
        }

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FFmpegError::OutputError(format!("Failed to create output directory: {}", e))
            })?;
        }

        let duration = end_sec - start_sec;
        let result = tokio::process::Command::new(&self.info.ffmpeg_path)
            .args([
                "-y",
                "-ss",
                &format!("{:.3}", start_sec),
                "-i",
                &input.to_string_lossy(),
                "-t",
                &format!("{:.3}", duration),
                "-c:v",
                "libx264",
                "-preset",
                "fast",
                "-crf",
                "23",
                "-c:a",
                "aac",
                "-b:a",
                "128k",
                "-movflags",
                "+faststart",
                &output.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(FFmpegError::ProcessError)?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(FFmpegError::ExecutionFailed(format!(
                "Clip extraction failed: {}",
                stderr
            )));
        }

        Ok(())
    }
}

/// Parses ffprobe JSON output into MediaInfo
fn parse_probe_output(json: &str) -> FFmpegResult<MediaInfo> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| FFmpegError::ProbeError(format!("Failed to parse probe output: {}", e)))?;

    let format = &value["format"];
    let duration_sec = format["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| FFmpegError::ProbeError("Missing duration in probe output".to_string()))?;

    let format_name = format["format_name"].as_str().unwrap_or("unknown");

    Ok(MediaInfo {
        duration_sec,
        format: format_name.to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{"format": {"duration": "12.345", "format_name": "mov,mp4,m4a"}}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration_sec, 12.345);
        assert_eq!(info.format, "mov,mp4,m4a");
    }

    #[test]
    fn test_parse_probe_output_missing_duration() {
        let json = r#"{"format": {"format_name": "mov"}}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(FFmpegError::ProbeError(_))
        ));
    }

    #[test]
    fn test_parse_probe_output_invalid_json() {
        assert!(matches!(
            parse_probe_output("not json"),
            Err(FFmpegError::ProbeError(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_frame_missing_input() {
        let info = FFmpegInfo {
            ffmpeg_path: "ffmpeg".into(),
            ffprobe_path: "ffprobe".into(),
            version: "test".to_string(),
        };
        let runner = FFmpegRunner::new(info);
        let result = runner
            .extract_frame(Path::new("/nonexistent/video.mp4"), 1.0, Path::new("/tmp/f.jpg"))
            .await;
        assert!(matches!(result, Err(FFmpegError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_extract_clip_invalid_range() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"stub").unwrap();

        let info = FFmpegInfo {
            ffmpeg_path: "ffmpeg".into(),
            ffprobe_path: "ffprobe".into(),
            version: "test".to_string(),
        };
        let runner = FFmpegRunner::new(info);
        let result = runner
            .extract_clip(&input, &dir.path().join("out.mp4"), 5.0, 5.0)
            .await;
        assert!(matches!(result, Err(FFmpegError::InvalidInput(_))));
    }
}
