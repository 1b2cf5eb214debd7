//! FFmpeg / ffprobe process spawning.
//!
//! FFmpeg runs as a child process with stdout discarded and stderr drained on a
//! background thread into a bounded buffer. The caller blocks until the process
//! exits; failures come back as `AppError` values, including failures of the
//! reader thread itself.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

use parking_lot::Mutex;

use crate::error::AppError;

const TARGET: &str = "clip_finalizer::ffmpeg::runner";

/// Keep only the last N bytes of stderr to avoid unbounded memory growth.
const MAX_STDERR_BYTES: usize = 64 * 1024;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

fn drain_stderr<R: Read + Send + 'static>(
    reader: R,
    buffer: Arc<Mutex<Vec<u8>>>,
) -> thread::JoinHandle<std::io::Result<()>> {
    thread::spawn(move || {
        let mut stream_reader = BufReader::new(reader);
        let mut line_buf = Vec::with_capacity(256);
        while stream_reader.read_until(b'\n', &mut line_buf)? > 0 {
            let mut guard = buffer.lock();
            guard.extend_from_slice(&line_buf);
            if guard.len() > MAX_STDERR_BYTES {
                let excess = guard.len() - MAX_STDERR_BYTES;
                guard.drain(..excess);
            }
            drop(guard);
            line_buf.clear();
        }
        Ok(())
    })
}

/// Run FFmpeg with `args` and block until it exits.
pub fn run_ffmpeg_blocking(ffmpeg: &Path, args: &[String]) -> Result<(), AppError> {
    let input_arg = args
        .iter()
        .position(|a| a == "-i")
        .and_then(|i| args.get(i + 1));
    log::debug!(
        target: TARGET,
        "Spawning FFmpeg: path={}, input={:?}, output={:?}",
        ffmpeg.display(),
        input_arg,
        args.last()
    );

    let mut cmd = Command::new(ffmpeg);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);
    let mut child = cmd.spawn().map_err(|e| {
        log::error!(target: TARGET, "Failed to spawn FFmpeg: {}", e);
        AppError::ffmpeg_failed(-1, format!("Failed to spawn FFmpeg: {}", e))
    })?;

    let Some(stderr) = child.stderr.take() else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(AppError::ffmpeg_failed(-1, "Failed to capture stderr"));
    };

    let stderr_buffer = Arc::new(Mutex::new(Vec::new()));
    let stderr_handle = drain_stderr(stderr, Arc::clone(&stderr_buffer));

    let status = child.wait()?;
    match stderr_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            log::warn!(target: TARGET, "Reading FFmpeg stderr failed: {}", e);
        }
        Err(_) => {
            return Err(AppError::ffmpeg_failed(
                -1,
                "FFmpeg stderr reader thread panicked",
            ));
        }
    }

    let stderr_str = String::from_utf8_lossy(&stderr_buffer.lock()).to_string();

    if status.success() {
        log::debug!(target: TARGET, "FFmpeg completed successfully");
        Ok(())
    } else {
        let code = status.code().unwrap_or(-1);
        let err_preview = stderr_str
            .lines()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .join("; ");
        log::error!(target: TARGET, "FFmpeg failed (code={}): {}", code, err_preview);
        Err(AppError::FfmpegFailed {
            code,
            stderr: stderr_str,
        })
    }
}

/// Run ffprobe with `args` and return its stdout.
pub fn run_ffprobe_blocking(ffprobe: &Path, args: &[String]) -> Result<String, AppError> {
    log::debug!(target: TARGET, "Spawning ffprobe: {:?}", args);

    let mut cmd = Command::new(ffprobe);
    cmd.args(args).stdin(Stdio::null());
    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);
    let output = cmd
        .output()
        .map_err(|e| AppError::FfprobeFailed(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::FfprobeFailed(format!(
            "exit code {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|_| AppError::FfprobeFailed("ffprobe output was not valid UTF-8".to_string()))
}
