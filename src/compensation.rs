//! Keyframe compensation for stream-copy cuts.
//!
//! A stream-copy cut starts on the last keyframe at or before the requested
//! offset, so the clip begins up to one GOP early. The compensation is how far
//! early: `relative_start - last_keyframe`.

use std::path::Path;

use crate::error::AppError;
use crate::ffmpeg::MediaTools;
use crate::trim::clamp_relative_start;

const TARGET: &str = "clip_finalizer::compensation";

/// Keyframe timestamps may be printed with rounding; treat a keyframe this close
/// past the cut point as at the cut point.
const TIMESTAMP_EPSILON_SECS: f64 = 1e-6;

/// Read a little past the cut so a keyframe sitting exactly on it is not lost
/// at the end of the probe interval.
const PROBE_MARGIN_SECS: f64 = 0.1;

/// Compensation from probed keyframe timestamps.
pub fn compensation_from_keyframes(
    buffer_file: &Path,
    relative_start: f64,
    keyframes: &[f64],
) -> Result<f64, AppError> {
    let last = keyframes
        .iter()
        .copied()
        .filter(|&t| t <= relative_start + TIMESTAMP_EPSILON_SECS)
        .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))));
    match last {
        Some(keyframe) => Ok(relative_start - keyframe),
        None => Err(AppError::NoFrameData(buffer_file.to_path_buf())),
    }
}

/// Probe `buffer_file` and compute how far before `relative_start` the
/// stream-copy cut actually begins.
pub fn estimate_compensation(
    tools: &dyn MediaTools,
    buffer_file: &Path,
    relative_start: f64,
) -> Result<f64, AppError> {
    let relative_start = clamp_relative_start(relative_start);
    log::debug!(
        target: TARGET,
        "Probing keyframes of {} up to {}s",
        buffer_file.display(),
        relative_start
    );
    let keyframes = tools.probe_keyframes(buffer_file, relative_start + PROBE_MARGIN_SECS)?;
    let compensation = compensation_from_keyframes(buffer_file, relative_start, &keyframes)?;
    log::info!(
        target: TARGET,
        "Cut compensation for {}: {}s",
        buffer_file.display(),
        compensation
    );
    Ok(compensation)
}
