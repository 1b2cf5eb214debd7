pub mod discovery;
mod error;
pub mod ffprobe;
mod runner;

use std::path::{Path, PathBuf};

pub use error::{FfmpegErrorPayload, parse_ffmpeg_error};
pub use runner::{run_ffmpeg_blocking, run_ffprobe_blocking};

use crate::error::AppError;

/// Blocking access to the external media tools. The queue calls these from the
/// blocking pool, one at a time.
pub trait MediaTools: Send + Sync + 'static {
    /// Run FFmpeg with the given arguments; the output file is the last argument.
    fn run_ffmpeg(&self, args: &[String]) -> Result<(), AppError>;

    /// Keyframe timestamps of the first video stream from the start of `input`
    /// up to `until_secs`, in stream order.
    fn probe_keyframes(&self, input: &Path, until_secs: f64) -> Result<Vec<f64>, AppError>;
}

/// Resolved FFmpeg + ffprobe binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegTools {
    pub fn new(ffmpeg: PathBuf, ffprobe: PathBuf) -> Self {
        Self { ffmpeg, ffprobe }
    }

    /// Resolve both binaries, preferring an explicitly configured ffmpeg path.
    pub fn discover(configured_ffmpeg: Option<&Path>) -> Result<Self, AppError> {
        let ffmpeg = discovery::resolve_ffmpeg_path(configured_ffmpeg)?;
        let ffprobe = discovery::resolve_ffprobe_path(&ffmpeg)?;
        log::info!(
            target: "clip_finalizer::ffmpeg",
            "Using ffmpeg={} ffprobe={}",
            ffmpeg.display(),
            ffprobe.display()
        );
        Ok(Self { ffmpeg, ffprobe })
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe
    }
}

impl MediaTools for FfmpegTools {
    fn run_ffmpeg(&self, args: &[String]) -> Result<(), AppError> {
        run_ffmpeg_blocking(&self.ffmpeg, args)
    }

    fn probe_keyframes(&self, input: &Path, until_secs: f64) -> Result<Vec<f64>, AppError> {
        ffprobe::probe_keyframe_timestamps(&self.ffprobe, input, until_secs)
    }
}

/// Path to string for FFmpeg args or logging.
pub fn path_to_string(path: &(impl AsRef<Path> + ?Sized)) -> String {
    path.as_ref().to_string_lossy().to_string()
}

/// Seconds formatted for `-ss` / `-t` style arguments.
pub fn seconds_arg(secs: f64) -> String {
    format!("{}", secs)
}
