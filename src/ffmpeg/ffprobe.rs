//! ffprobe JSON parsing: container/stream metadata and keyframe timestamps.

use std::path::Path;

use serde::Deserialize;

use super::path_to_string;
use super::runner::run_ffprobe_blocking;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    size: Option<String>,
    #[serde(default)]
    format_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Option<Vec<FfprobeStream>>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFrame {
    #[serde(default)]
    best_effort_timestamp_time: Option<String>,
    #[serde(default)]
    pts_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFrames {
    #[serde(default)]
    frames: Vec<FfprobeFrame>,
}

fn parse_frame_rate(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub duration: f64,
    /// Format start_time (seconds). Non-zero for some stream-copied cuts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub fps: f64,
    pub codec_name: Option<String>,
    pub format_name: Option<String>,
}

/// Parse `-show_format -show_streams` JSON into VideoMetadata.
pub fn parse_ffprobe_json(json: &str) -> Result<VideoMetadata, AppError> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| AppError::FfprobeFailed(format!("Failed to parse ffprobe JSON: {}", e)))?;

    let format = output.format.as_ref();
    let parse_format_f64 = |field: Option<&String>| field.and_then(|s| s.parse::<f64>().ok());
    let duration = parse_format_f64(format.and_then(|f| f.duration.as_ref())).unwrap_or(0.0);
    let start_time =
        parse_format_f64(format.and_then(|f| f.start_time.as_ref())).filter(|&t| t > 0.0);
    let size = format
        .and_then(|f| f.size.as_ref())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let video_stream = output
        .streams
        .as_ref()
        .and_then(|streams| streams.iter().find(|s| s.codec_type.as_deref() == Some("video")));

    Ok(VideoMetadata {
        duration,
        start_time,
        width: video_stream.and_then(|s| s.width).unwrap_or(0),
        height: video_stream.and_then(|s| s.height).unwrap_or(0),
        size,
        fps: video_stream
            .and_then(|s| s.r_frame_rate.as_deref())
            .and_then(parse_frame_rate)
            .unwrap_or(0.0),
        codec_name: video_stream.and_then(|s| s.codec_name.clone()),
        format_name: format.and_then(|f| f.format_name.clone()),
    })
}

/// Parse `-show_frames` JSON into frame timestamps (seconds), in stream order.
/// Frames without a usable timestamp are dropped.
pub fn parse_frame_timestamps(json: &str) -> Result<Vec<f64>, AppError> {
    let output: FfprobeFrames = serde_json::from_str(json)
        .map_err(|e| AppError::FfprobeFailed(format!("Failed to parse ffprobe frames: {}", e)))?;
    Ok(output
        .frames
        .iter()
        .filter_map(|f| {
            f.best_effort_timestamp_time
                .as_deref()
                .or(f.pts_time.as_deref())
                .and_then(|s| s.trim().parse::<f64>().ok())
        })
        .filter(|t| t.is_finite())
        .collect())
}

/// ffprobe arguments that list the first video stream's keyframes from the start
/// of the file up to `until_secs`, without decoding.
pub fn build_keyframe_probe_args(input: &Path, until_secs: f64) -> Vec<String> {
    vec![
        "-v".into(),
        "quiet".into(),
        "-print_format".into(),
        "json".into(),
        "-skip_frame".into(),
        "nokey".into(),
        "-read_intervals".into(),
        format!("%+{}", until_secs),
        "-select_streams".into(),
        "v:0".into(),
        "-show_frames".into(),
        path_to_string(input),
    ]
}

/// Run ffprobe on a video file and return container/stream metadata.
pub fn get_video_metadata(ffprobe: &Path, path: &Path) -> Result<VideoMetadata, AppError> {
    let args = vec![
        "-v".to_string(),
        "quiet".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        path_to_string(path),
    ];
    let json = run_ffprobe_blocking(ffprobe, &args)?;
    parse_ffprobe_json(&json)
}

/// Run the keyframe probe and return the keyframe timestamps it found.
pub fn probe_keyframe_timestamps(
    ffprobe: &Path,
    input: &Path,
    until_secs: f64,
) -> Result<Vec<f64>, AppError> {
    let args = build_keyframe_probe_args(input, until_secs);
    let json = run_ffprobe_blocking(ffprobe, &args)?;
    parse_frame_timestamps(&json)
}
