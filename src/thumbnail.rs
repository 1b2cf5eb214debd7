//! Preview thumbnail for a finished clip.

use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::ffmpeg::{MediaTools, path_to_string, seconds_arg};
use crate::triplet::thumbnail_path_for_video;

const TARGET: &str = "clip_finalizer::thumbnail";

/// Frames further into the file cost a longer seek for little gain.
const THUMBNAIL_TIMESTAMP_SECS: f64 = 0.0;

pub fn thumbnail_args(video: &Path, thumbnail: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-hide_banner".into(),
        "-ss".into(),
        seconds_arg(THUMBNAIL_TIMESTAMP_SECS),
        "-i".into(),
        path_to_string(video),
        "-frames:v".into(),
        "1".into(),
        "-update".into(),
        "1".into(),
        path_to_string(thumbnail),
    ]
}

/// Write `<name>.png` beside the finished clip `video`.
pub fn generate_thumbnail(tools: &dyn MediaTools, video: &Path) -> Result<PathBuf, AppError> {
    let thumbnail = thumbnail_path_for_video(video);
    tools.run_ffmpeg(&thumbnail_args(video, &thumbnail))?;
    log::info!(target: TARGET, "Got thumbnail for {}", video.display());
    Ok(thumbnail)
}
