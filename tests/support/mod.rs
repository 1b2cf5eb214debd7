#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;

use clip_finalizer_core::config::FinalizerConfig;
use clip_finalizer_core::events::Settlement;
use clip_finalizer_core::ffmpeg::FfmpegTools;
use clip_finalizer_core::ffmpeg::ffprobe::{VideoMetadata, get_video_metadata};
use clip_finalizer_core::queue::QueueProcessor;
use parking_lot::Mutex;

/// Frames per second of generated buffers.
pub const TEST_FPS: u32 = 30;
/// Seconds between forced keyframes in generated buffers.
pub const TEST_KEYFRAME_INTERVAL_SECS: u32 = 2;

pub struct IntegrationEnv {
    pub tools: FfmpegTools,
    dir: tempfile::TempDir,
}

impl IntegrationEnv {
    pub fn new() -> Self {
        let tools = FfmpegTools::discover(None).expect("FFmpeg not found");
        let dir = tempfile::tempdir().expect("tempdir");
        Self { tools, dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.path("videos")
    }

    /// Generate an H.264 + AAC buffer file with a keyframe every
    /// [`TEST_KEYFRAME_INTERVAL_SECS`].
    pub fn with_buffer(&self, name: &str, duration_secs: f32) -> PathBuf {
        let buffer_dir = self.path("buffer");
        std::fs::create_dir_all(&buffer_dir).expect("create buffer dir");
        let output_path = buffer_dir.join(name);
        let status = create_test_buffer(self.tools.ffmpeg_path(), &output_path, duration_secs)
            .expect("failed to create test buffer");
        assert!(status.success(), "ffmpeg failed to create test buffer");
        output_path
    }

    pub fn config(&self, min_activity_duration: f64) -> FinalizerConfig {
        FinalizerConfig::new(self.storage_dir()).with_min_activity_duration(min_activity_duration)
    }

    /// Queue wired to the real tools, collecting every published settlement.
    pub fn spawn_queue(&self, min_activity_duration: f64) -> (QueueProcessor, Arc<Mutex<Vec<Settlement>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_in_sink = Arc::clone(&events);
        let sink = move |s: &Settlement| events_in_sink.lock().push(s.clone());
        let queue = QueueProcessor::spawn(
            Arc::new(self.config(min_activity_duration)),
            Arc::new(self.tools.clone()),
            Arc::new(sink),
        );
        (queue, events)
    }

    pub fn metadata(&self, path: &Path) -> VideoMetadata {
        get_video_metadata(self.tools.ffprobe_path(), path).expect("get_video_metadata")
    }
}

pub fn create_test_buffer(
    ffmpeg: &Path,
    output_path: &Path,
    duration_secs: f32,
) -> std::io::Result<ExitStatus> {
    let duration_arg = format!("{}", duration_secs);
    let gop = (TEST_FPS * TEST_KEYFRAME_INTERVAL_SECS).to_string();
    Command::new(ffmpeg)
        .args([
            "-loglevel",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            &format!("testsrc=duration={}:size=320x240:rate={}", duration_arg, TEST_FPS),
            "-f",
            "lavfi",
            "-i",
            &format!("sine=frequency=440:duration={}", duration_arg),
            "-map",
            "0:v",
            "-map",
            "1:a",
            "-c:v",
            "libx264",
            "-preset",
            "ultrafast",
            "-pix_fmt",
            "yuv420p",
            "-g",
            &gop,
            "-keyint_min",
            &gop,
            "-sc_threshold",
            "0",
            "-c:a",
            "aac",
            "-shortest",
            output_path.to_string_lossy().as_ref(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
}
