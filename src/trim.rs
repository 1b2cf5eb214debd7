//! Stream-copy trimming of a buffer file down to one activity.
//!
//! Never re-encodes: `-c:v copy -c:a copy` keeps the clip available moments
//! after the activity ends, at the cost of cutting on the keyframe at or before
//! the requested start. `-avoid_negative_ts make_zero` rebases the timestamps
//! left negative by seeking into the middle of a GOP.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;
use crate::ffmpeg::{MediaTools, path_to_string, seconds_arg};

const TARGET: &str = "clip_finalizer::trim";

pub const CLIP_EXTENSION: &str = "mp4";
/// The partial file's extension hides the format from FFmpeg, so name it.
const CLIP_MUXER: &str = "mp4";
const PARTIAL_SUFFIX: &str = ".part";

static INVALID_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/|?*]"#).expect("invalid filename regex"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));

/// Replace characters that are invalid in file names with a space and collapse
/// whitespace runs to a single space.
pub fn sanitize_filename(name: &str) -> String {
    let replaced = INVALID_FILENAME_CHARS.replace_all(name, " ");
    WHITESPACE_RUN
        .replace_all(&replaced, " ")
        .trim()
        .to_string()
}

/// Clamp a requested start offset into the buffer. Negative or non-finite
/// offsets become zero.
pub fn clamp_relative_start(relative_start: f64) -> f64 {
    if relative_start.is_finite() && relative_start > 0.0 {
        relative_start
    } else {
        0.0
    }
}

/// Base name for the finished clip: the buffer's stem, plus ` - <name>` when
/// the activity supplied one.
pub fn clip_base_name(buffer_file: &Path, desired_name: Option<&str>) -> String {
    let stem = buffer_file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let raw = match desired_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) if stem.is_empty() => name.to_string(),
        Some(name) => format!("{} - {}", stem, name),
        None => stem,
    };
    sanitize_filename(&raw)
}

/// A resolved stream-copy cut.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimJob {
    pub buffer_file: PathBuf,
    pub output_path: PathBuf,
    pub relative_start: f64,
    pub duration: f64,
}

impl TrimJob {
    pub fn plan(
        buffer_file: &Path,
        output_dir: &Path,
        desired_name: Option<&str>,
        relative_start: f64,
        duration: f64,
    ) -> Result<Self, AppError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(AppError::invalid_request(format!(
                "duration must be a positive number of seconds, got {}",
                duration
            )));
        }
        if relative_start < 0.0 {
            log::info!(
                target: TARGET,
                "Avoiding error by rejecting negative start {}",
                relative_start
            );
        }
        let relative_start = clamp_relative_start(relative_start);

        let base = clip_base_name(buffer_file, desired_name);
        if base.is_empty() {
            return Err(AppError::invalid_request(format!(
                "cannot derive a clip name from {}",
                buffer_file.display()
            )));
        }
        let output_path = output_dir.join(format!("{}.{}", base, CLIP_EXTENSION));
        if output_path == buffer_file {
            return Err(AppError::invalid_request(format!(
                "clip would overwrite its buffer file {}",
                buffer_file.display()
            )));
        }

        Ok(Self {
            buffer_file: buffer_file.to_path_buf(),
            output_path,
            relative_start,
            duration,
        })
    }

    /// Seek and duration bound on the input side, duration bound again on the
    /// output side, no re-encode.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let duration = seconds_arg(self.duration);
        vec![
            "-y".into(),
            "-hide_banner".into(),
            "-ss".into(),
            seconds_arg(self.relative_start),
            "-t".into(),
            duration.clone(),
            "-i".into(),
            path_to_string(&self.buffer_file),
            "-t".into(),
            duration,
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            "copy".into(),
            "-avoid_negative_ts".into(),
            "make_zero".into(),
            "-f".into(),
            CLIP_MUXER.into(),
            path_to_string(&self.partial_path()),
        ]
    }

    /// Where FFmpeg writes while cutting. Renamed to `output_path` on success.
    pub fn partial_path(&self) -> PathBuf {
        let mut name = self.output_path.as_os_str().to_os_string();
        name.push(PARTIAL_SUFFIX);
        PathBuf::from(name)
    }
}

/// Cut `job` out of its buffer file. FFmpeg writes to [`TrimJob::partial_path`]
/// and only a complete cut replaces `output_path`; a failed cut never touches a
/// clip already at that path.
pub fn trim_clip(tools: &dyn MediaTools, job: &TrimJob) -> Result<PathBuf, AppError> {
    log::info!(
        target: TARGET,
        "Cutting {} start={}s duration={}s -> {}",
        job.buffer_file.display(),
        job.relative_start,
        job.duration,
        job.output_path.display()
    );

    if let Some(parent) = job.output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let partial = job.partial_path();
    let result = tools.run_ffmpeg(&job.ffmpeg_args()).and_then(|()| {
        if !partial.exists() {
            return Err(AppError::ffmpeg_failed(
                -1,
                format!("FFmpeg reported success but {} is missing", partial.display()),
            ));
        }
        fs::rename(&partial, &job.output_path)?;
        Ok(())
    });

    match result {
        Ok(()) => {
            log::info!(target: TARGET, "Cut succeeded: {}", job.output_path.display());
            Ok(job.output_path.clone())
        }
        Err(e) => {
            log::error!(target: TARGET, "Cut failed for {}: {}", job.buffer_file.display(), e);
            discard_partial(&partial);
            Err(e)
        }
    }
}

fn discard_partial(partial: &Path) {
    match fs::remove_file(partial) {
        Ok(()) => log::debug!(target: TARGET, "Removed partial cut {}", partial.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!(
            target: TARGET,
            "Unable to remove partial cut {}: {}",
            partial.display(),
            e
        ),
    }
}
