//! Library error type. Implements Display and Serialize so the sidecar can hand it to the host.

use std::path::PathBuf;

use crate::ffmpeg::parse_ffmpeg_error;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    FfmpegNotFound(String),

    #[error("FFmpeg failed (code {code}): {stderr}")]
    FfmpegFailed { code: i32, stderr: String },

    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    #[error("Could not find frame data from ffprobe on {}", .0.display())]
    NoFrameData(PathBuf),

    #[error("Metadata not found for {}", .0.display())]
    MetadataNotFound(PathBuf),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Clip queue is closed")]
    QueueClosed,

    #[error("Background task failed: {0}")]
    Task(String),
}

impl AppError {
    pub fn ffmpeg_failed(code: i32, stderr: impl Into<String>) -> Self {
        Self::FfmpegFailed {
            code,
            stderr: stderr.into(),
        }
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    /// Short user-facing line plus the full text for an expandable detail view.
    pub fn summary_and_detail(&self) -> (String, String) {
        match self {
            AppError::FfmpegFailed { code, stderr } => {
                let payload = parse_ffmpeg_error(stderr, Some(*code));
                (payload.summary, payload.detail)
            }
            _ => {
                let text = self.to_string();
                (text.clone(), text)
            }
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            AppError::FfmpegFailed { .. } => {
                let (summary, detail) = self.summary_and_detail();
                let json = serde_json::json!({ "summary": summary, "detail": detail });
                serializer.serialize_str(&json.to_string())
            }
            _ => serializer.serialize_str(&self.to_string()),
        }
    }
}
