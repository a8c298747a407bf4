//! FFmpeg Detection Module
//!
//! Handles detection and validation of system-installed FFmpeg/FFprobe
//! binaries.

use std::path::PathBuf;
use std::process::Command;

use super::{FFmpegError, FFmpegResult};

/// Information about a detected FFmpeg installation
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_path: PathBuf,
    /// FFmpeg version string
    pub version: String,
}

/// Detect FFmpeg from system PATH
///
/// Searches common install locations first, then the PATH environment.
pub fn detect_system_ffmpeg() -> FFmpegResult<FFmpegInfo> {
    let ffmpeg_path = which_binary(ffmpeg_binary_name())?;
    let ffprobe_path = which_binary(ffprobe_binary_name())?;

    let version = get_ffmpeg_version(&ffmpeg_path)?;

    Ok(FFmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
    })
}

fn ffmpeg_binary_name() -> &'static str {
    #[cfg(target_os = "windows")]
    return "ffmpeg.exe";
    #[cfg(not(target_os = "windows"))]
    "ffmpeg"
}

fn ffprobe_binary_name() -> &'static str {
    #[cfg(target_os = "windows")]
    return "ffprobe.exe";
    #[cfg(not(target_os = "windows"))]
    "ffprobe"
}

/// Find a binary in common locations or the system PATH
fn which_binary(binary_name: &str) -> FFmpegResult<PathBuf> {
    for dir in common_binary_dirs() {
        let candidate = dir.join(binary_name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    if let Ok(path_var) = std::env::var("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(binary_name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    Err(FFmpegError::NotFound)
}

fn common_binary_dirs() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    return vec![
        PathBuf::from("/opt/homebrew/bin"),
        PathBuf::from("/usr/local/bin"),
    ];

    #[cfg(target_os = "linux")]
    return vec![
        PathBuf::from("/usr/bin"),
        PathBuf::from("/usr/local/bin"),
    ];

    #[cfg(target_os = "windows")]
    return Vec::new();
}

/// Gets the FFmpeg version string from a binary
fn get_ffmpeg_version(path: &PathBuf) -> FFmpegResult<String> {
    let output = Command::new(path)
        .arg("-version")
        .output()
        .map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "ffmpeg -version returned non-zero".to_string(),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = stdout
        .lines()
        .next()
        .unwrap_or("unknown")
        .trim()
        .to_string();

    Ok(version)
}

// =============================================================================
// Tests
// =============================================================================
