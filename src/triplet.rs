//! Video / metadata / thumbnail triplets.
//!
//! A finished clip is `<name>.mp4` plus `<name>.json` and `<name>.png`. All
//! deletion goes through [`delete_video`], which removes the video first and
//! only then the sidecars, so a failed delete never leaves a video without its
//! metadata.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

const TARGET: &str = "clip_finalizer::triplet";

/// Application metadata attached to a clip. Opaque to the pipeline.
pub type MetadataPayload = Map<String, Value>;

/// Payload key marking a triplet as exempt from automated cleanup.
pub const PROTECTED_KEY: &str = "protected";

/// Contents of a `<name>.json` sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipMetadata {
    pub video_path: PathBuf,
    #[serde(flatten)]
    pub payload: MetadataPayload,
}

impl ClipMetadata {
    pub fn is_protected(&self) -> bool {
        self.payload
            .get(PROTECTED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

pub fn metadata_path_for_video(video: &Path) -> PathBuf {
    video.with_extension("json")
}

pub fn thumbnail_path_for_video(video: &Path) -> PathBuf {
    video.with_extension("png")
}

/// Write the sidecar for `video`, replacing any existing one.
pub fn write_metadata(video: &Path, payload: &MetadataPayload) -> Result<PathBuf, AppError> {
    let metadata_path = metadata_path_for_video(video);
    log::info!(target: TARGET, "Writing metadata file {}", metadata_path.display());

    let mut payload = payload.clone();
    // The sidecar's own videoPath always wins over a stale one in the payload.
    payload.remove("videoPath");
    let doc = ClipMetadata {
        video_path: video.to_path_buf(),
        payload,
    };
    let json = serde_json::to_string_pretty(&doc)?;
    fs::write(&metadata_path, json)?;
    Ok(metadata_path)
}

pub fn read_metadata(video: &Path) -> Result<ClipMetadata, AppError> {
    let metadata_path = metadata_path_for_video(video);
    let content = match fs::read_to_string(&metadata_path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::MetadataNotFound(video.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&content)?)
}

/// Remove `file`, logging instead of failing. Returns whether it was removed.
pub fn try_unlink(file: &Path) -> bool {
    log::debug!(target: TARGET, "Deleting {}", file.display());
    match fs::remove_file(file) {
        Ok(()) => true,
        Err(e) => {
            log::warn!(target: TARGET, "Unable to delete {}: {}", file.display(), e);
            false
        }
    }
}

/// Delete a clip triplet. Returns false (and leaves sidecars alone) when the
/// video itself could not be deleted. Sidecar failures are logged only.
pub fn delete_video(video: &Path) -> bool {
    log::info!(target: TARGET, "Deleting video {}", video.display());

    if !try_unlink(video) {
        return false;
    }

    let metadata_path = metadata_path_for_video(video);
    if metadata_path.exists() {
        try_unlink(&metadata_path);
    }
    let thumbnail_path = thumbnail_path_for_video(video);
    if thumbnail_path.exists() {
        try_unlink(&thumbnail_path);
    }
    true
}

/// Mark a triplet as exempt from automated cleanup.
pub fn protect(video: &Path) -> Result<ClipMetadata, AppError> {
    let mut metadata = read_metadata(video)?;
    if !metadata.is_protected() {
        log::info!(target: TARGET, "Protecting {}", video.display());
        metadata
            .payload
            .insert(PROTECTED_KEY.to_string(), Value::Bool(true));
        write_metadata(video, &metadata.payload)?;
    }
    Ok(metadata)
}

pub fn is_protected(video: &Path) -> Result<bool, AppError> {
    Ok(read_metadata(video)?.is_protected())
}
