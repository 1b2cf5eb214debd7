//! Map FFmpeg exit codes to user-facing messages.
//!
//! Exit codes are from ffmpeg.c: 1 (general), 69 (rate exceeded),
//! 123 (hard exit), 255 (signal). -1 is used for spawn failure.
//! Stderr is kept as detail for debugging.

use serde::Serialize;

/// Summary shown to the user plus the raw stderr as expandable detail.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FfmpegErrorPayload {
    pub summary: String,
    pub detail: String,
}

pub fn parse_ffmpeg_error(stderr: &str, exit_code: Option<i32>) -> FfmpegErrorPayload {
    let summary = match exit_code {
        Some(code) => known_exit_code_summary(code)
            .unwrap_or_else(|| format!("FFmpeg failed (exit code {}).", code)),
        None => first_line_truncated(stderr, 120),
    };
    FfmpegErrorPayload {
        summary,
        detail: stderr.trim().to_string(),
    }
}

fn known_exit_code_summary(code: i32) -> Option<String> {
    match code {
        -1 => Some("FFmpeg not found or failed to start.".into()),
        1 => Some("FFmpeg failed.".into()),
        69 => Some("FFmpeg rate limit exceeded.".into()),
        123 | 255 => Some("FFmpeg was stopped.".into()),
        _ => None,
    }
}

const ELLIPSIS: &str = "…";

fn first_line_truncated(stderr: &str, max_len: usize) -> String {
    let first = stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    if first.len() <= max_len {
        return first.to_string();
    }
    let mut cut = max_len.saturating_sub(ELLIPSIS.len());
    while !first.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &first[..cut], ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_1() {
        let p = parse_ffmpeg_error("", Some(1));
        assert_eq!(p.summary, "FFmpeg failed.");
    }

    #[test]
    fn exit_code_255() {
        let p = parse_ffmpeg_error("", Some(255));
        assert_eq!(p.summary, "FFmpeg was stopped.");
    }

    #[test]
    fn exit_code_minus_one() {
        let p = parse_ffmpeg_error("Failed to spawn FFmpeg", Some(-1));
        assert!(p.summary.contains("failed to start"));
    }

    #[test]
    fn unknown_code_short_summary() {
        let p = parse_ffmpeg_error("moov atom not found\n", Some(42));
        assert_eq!(p.summary, "FFmpeg failed (exit code 42).");
        assert_eq!(p.detail, "moov atom not found");
    }

    #[test]
    fn no_code_uses_first_stderr_line() {
        let p = parse_ffmpeg_error("\n  buffer.mp4: No such file or directory\nSecond", None);
        assert_eq!(p.summary, "buffer.mp4: No such file or directory");
    }

    #[test]
    fn long_stderr_truncated_on_char_boundary() {
        let long = "é".repeat(100);
        let p = parse_ffmpeg_error(&long, None);
        assert!(p.summary.len() <= 120);
        assert!(p.summary.ends_with('…'));
    }
}
