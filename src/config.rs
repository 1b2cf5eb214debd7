//! Finalizer configuration. Owned by the host and handed to the queue once.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

/// Activities shorter than this are discarded when no threshold is configured.
pub const DEFAULT_MIN_ACTIVITY_DURATION_SECS: f64 = 10.0;

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FinalizerConfig {
    /// Directory finished clips (and their sidecars) are written to.
    pub storage_path: PathBuf,
    /// Minimum activity length in seconds worth keeping.
    pub min_activity_duration: Option<f64>,
    /// Explicit FFmpeg binary; discovered when unset.
    pub ffmpeg_path: Option<PathBuf>,
}

impl FinalizerConfig {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            min_activity_duration: None,
            ffmpeg_path: None,
        }
    }

    pub fn with_min_activity_duration(mut self, secs: f64) -> Self {
        self.min_activity_duration = Some(secs);
        self
    }

    pub fn effective_min_activity_duration(&self) -> f64 {
        self.min_activity_duration
            .unwrap_or(DEFAULT_MIN_ACTIVITY_DURATION_SECS)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.storage_path.as_os_str().is_empty() {
            return Err(AppError::Config("storagePath must not be empty".into()));
        }
        let min = self.effective_min_activity_duration();
        if !min.is_finite() || min < 0.0 {
            return Err(AppError::Config(format!(
                "minActivityDuration must be a non-negative number, got {}",
                min
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case() {
        let config: FinalizerConfig = serde_json::from_str(
            r#"{ "storagePath": "/videos", "minActivityDuration": 15, "ffmpegPath": "/opt/ffmpeg" }"#,
        )
        .unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/videos"));
        assert_eq!(config.effective_min_activity_duration(), 15.0);
        assert_eq!(config.ffmpeg_path, Some(PathBuf::from("/opt/ffmpeg")));
    }

    #[test]
    fn min_duration_defaults_when_missing() {
        let config = FinalizerConfig::new("/videos");
        assert_eq!(
            config.effective_min_activity_duration(),
            DEFAULT_MIN_ACTIVITY_DURATION_SECS
        );
    }

    #[test]
    fn rejects_negative_min_duration() {
        let config = FinalizerConfig::new("/videos").with_min_activity_duration(-1.0);
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn load_reports_missing_file_as_config_error() {
        let err = FinalizerConfig::load(Path::new("/no/such/config.json")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn load_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "storagePath": "/videos", "minActivityDuration": 0 }"#).unwrap();
        let config = FinalizerConfig::load(&path).unwrap();
        assert_eq!(config.effective_min_activity_duration(), 0.0);
        assert!(config.ffmpeg_path.is_none());
    }
}
