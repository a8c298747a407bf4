//! FFmpeg Integration Module
//!
//! Provides FFmpeg functionality for the tagging pipeline:
//! - Media probing (duration)
//! - Single-frame extraction for vision analysis and thumbnails
//! - Clip extraction for scene previews
//!
//! Uses system-installed FFmpeg/FFprobe binaries.

mod detection;
mod runner;

pub use detection::{detect_system_ffmpeg, FFmpegInfo};
pub use runner::{FFmpegRunner, MediaInfo};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg and ensure it is on PATH.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("Output path error: {0}")]
    OutputError(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),
}

/// FFmpeg result type
pub type FFmpegResult<T> = Result<T, FFmpegError>;

impl From<FFmpegError> for crate::core::CoreError {
    fn from(e: FFmpegError) -> Self {
        match e {
            FFmpegError::ProbeError(msg) => crate::core::CoreError::Probe(msg),
            FFmpegError::InvalidInput(msg) => crate::core::CoreError::FileNotFound(msg),
            other => crate::core::CoreError::Extraction(other.to_string()),
        }
    }
}
