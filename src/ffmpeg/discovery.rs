use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::AppError;

const TARGET: &str = "clip_finalizer::ffmpeg::discovery";

#[cfg(target_os = "windows")]
fn find_in_path() -> Option<PathBuf> {
    which_like("where")
}

#[cfg(not(target_os = "windows"))]
fn find_in_path() -> Option<PathBuf> {
    which_like("which")
}

fn which_like(program: &str) -> Option<PathBuf> {
    let output = Command::new(program).arg("ffmpeg").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(PathBuf::from(first))
    }
}

fn common_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/opt/homebrew/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/opt/local/bin/ffmpeg"),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            PathBuf::from("C:\\ffmpeg\\bin\\ffmpeg.exe"),
            PathBuf::from("C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe"),
        ]
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", unix)))]
    {
        vec![]
    }
}

/// Resolve the FFmpeg binary.
///
/// Order: explicitly configured path, `FFMPEG_PATH` env, common install
/// locations, then a `which`/`where` lookup. A configured path that does not
/// exist is an error rather than a silent fallback, since the host asked for it.
pub fn resolve_ffmpeg_path(configured: Option<&Path>) -> Result<PathBuf, AppError> {
    if let Some(path) = configured {
        if path.exists() {
            log::debug!(target: TARGET, "FFmpeg path from configuration: {}", path.display());
            return Ok(path.to_path_buf());
        }
        return Err(AppError::FfmpegNotFound(format!(
            "Could not find ffmpeg at {}",
            path.display()
        )));
    }

    if let Ok(env_path) = std::env::var("FFMPEG_PATH") {
        let p = PathBuf::from(&env_path);
        if p.exists() {
            log::debug!(target: TARGET, "FFmpeg path from FFMPEG_PATH env: {}", p.display());
            return Ok(p);
        }
        log::warn!(target: TARGET, "FFMPEG_PATH={} does not exist, searching", env_path);
    }

    for path in common_paths() {
        if path.exists() {
            log::debug!(target: TARGET, "FFmpeg found in common path: {}", path.display());
            return Ok(path);
        }
    }

    if let Some(p) = find_in_path().filter(|p| p.exists()) {
        log::debug!(target: TARGET, "FFmpeg found in PATH: {}", p.display());
        return Ok(p);
    }

    log::error!(target: TARGET, "FFmpeg not found in PATH or common locations");
    Err(AppError::FfmpegNotFound(
        "FFmpeg not found. Please install FFmpeg on your system:\n  - macOS: brew install ffmpeg\n  - Linux: sudo apt install ffmpeg\n  - Windows: Download from https://ffmpeg.org/download.html"
            .to_string(),
    ))
}

/// Paths to try for ffprobe given an ffmpeg binary path (suffixed first, then plain).
pub fn ffprobe_candidates(ffmpeg_path: &Path) -> Vec<PathBuf> {
    let Some(parent) = ffmpeg_path.parent() else {
        return vec![];
    };
    let mut candidates = Vec::with_capacity(2);
    if let Some(suffix) = ffmpeg_path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.strip_prefix("ffmpeg"))
        .filter(|suffix| !suffix.is_empty())
    {
        candidates.push(parent.join(executable_name(&format!("ffprobe{suffix}"))));
    }
    candidates.push(parent.join(executable_name("ffprobe")));
    candidates
}

fn executable_name(base: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{base}.exe")
    } else {
        base.to_string()
    }
}

/// Resolve ffprobe next to ffmpeg (they ship together).
pub fn resolve_ffprobe_path(ffmpeg_path: &Path) -> Result<PathBuf, AppError> {
    let candidates = ffprobe_candidates(ffmpeg_path);
    if let Some(found) = candidates.iter().find(|c| c.exists()) {
        return Ok(found.clone());
    }
    Err(AppError::FfmpegNotFound(format!(
        "ffprobe not found next to {} (tried {:?})",
        ffmpeg_path.display(),
        candidates
    )))
}
