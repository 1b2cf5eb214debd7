//! Sorted directory listing used by clip listing and cleanup flows.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const TARGET: &str = "clip_finalizer::scanner";

/// File name pattern for finished clips.
pub const VIDEO_FILE_PATTERN: &str = r".*\.mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileSortDirection {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified_at_epoch_millis: u128,
}

fn file_info(path: PathBuf) -> std::io::Result<Option<FileInfo>> {
    let meta = fs::metadata(&path)?;
    if !meta.is_file() {
        return Ok(None);
    }
    let modified_at_epoch_millis = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    Ok(Some(FileInfo {
        path,
        size_bytes: meta.len(),
        modified_at_epoch_millis,
    }))
}

/// Files in `dir` (not recursive) whose name matches `pattern`, ordered by
/// modification time. Entries that vanish or fail to stat mid-scan are skipped.
pub fn list_sorted_files(
    dir: &Path,
    pattern: &Regex,
    direction: FileSortDirection,
) -> Result<Vec<FileInfo>, AppError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!(target: TARGET, "Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let name = entry.file_name();
        if !pattern.is_match(&name.to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        match file_info(path) {
            Ok(Some(info)) => files.push(info),
            Ok(None) => {}
            Err(e) => {
                log::warn!(
                    target: TARGET,
                    "Skipping {} (stat failed): {}",
                    entry.path().display(),
                    e
                );
            }
        }
    }

    match direction {
        FileSortDirection::NewestFirst => {
            files.sort_by(|a, b| b.modified_at_epoch_millis.cmp(&a.modified_at_epoch_millis))
        }
        FileSortDirection::OldestFirst => {
            files.sort_by(|a, b| a.modified_at_epoch_millis.cmp(&b.modified_at_epoch_millis))
        }
    }
    Ok(files)
}

/// Like [`list_sorted_files`] but compiles `pattern` first.
pub fn list_sorted_files_matching(
    dir: &Path,
    pattern: &str,
    direction: FileSortDirection,
) -> Result<Vec<FileInfo>, AppError> {
    let re = Regex::new(pattern)?;
    list_sorted_files(dir, &re, direction)
}

/// Finished clips in `dir`.
pub fn list_sorted_videos(
    dir: &Path,
    direction: FileSortDirection,
) -> Result<Vec<FileInfo>, AppError> {
    list_sorted_files_matching(dir, VIDEO_FILE_PATTERN, direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn touch(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
        path
    }

    #[test]
    fn newest_first_is_non_increasing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.mp4", 300);
        touch(dir.path(), "a.mp4", 10);
        touch(dir.path(), "c.mp4", 3600);

        let files = list_sorted_videos(dir.path(), FileSortDirection::NewestFirst).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4", "c.mp4"]);
        assert!(files
            .windows(2)
            .all(|w| w[0].modified_at_epoch_millis >= w[1].modified_at_epoch_millis));
    }

    #[test]
    fn oldest_first_is_non_decreasing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.mp4", 300);
        touch(dir.path(), "a.mp4", 10);
        touch(dir.path(), "c.mp4", 3600);

        let files = list_sorted_videos(dir.path(), FileSortDirection::OldestFirst).unwrap();
        assert!(files
            .windows(2)
            .all(|w| w[0].modified_at_epoch_millis <= w[1].modified_at_epoch_millis));
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn filters_by_pattern_and_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "clip.mp4", 1);
        touch(dir.path(), "clip.json", 1);
        touch(dir.path(), "clip.png", 1);
        fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let files = list_sorted_videos(dir.path(), FileSortDirection::NewestFirst).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("clip.mp4"));
    }

    #[test]
    fn reports_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sized.mp4"), vec![0u8; 2048]).unwrap();
        let files = list_sorted_videos(dir.path(), FileSortDirection::NewestFirst).unwrap();
        assert_eq!(files[0].size_bytes, 2048);
    }

    #[test]
    #[cfg(unix)]
    fn skips_entries_that_fail_to_stat() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "real.mp4", 5);
        std::os::unix::fs::symlink(dir.path().join("gone.mp4"), dir.path().join("dangling.mp4"))
            .unwrap();

        let files = list_sorted_videos(dir.path(), FileSortDirection::NewestFirst).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("real.mp4"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_sorted_files_matching(dir.path(), "(", FileSortDirection::OldestFirst)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidPattern(_)));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = list_sorted_videos(Path::new("/no/such/dir"), FileSortDirection::NewestFirst)
            .unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
