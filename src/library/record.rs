// Recording records and category rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the subdirectory (under the base directory) holding permanent recordings
pub const PERMANENT_DIR_NAME: &str = "permanent";

/// Extensions the recorder produces. Anything else in the directories is ignored.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["mp4", "aac", "m4a"];

/// Which list a recording belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Deleted automatically once older than the retention policy allows
    Normal,
    /// Never deleted automatically
    Permanent,
}

/// One audio file on disk.
///
/// Records are never mutated: a rename or move produces a new record on the
/// next reload and the old one is dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingRecord {
    /// Absolute path, the identity of the record
    pub path: PathBuf,

    /// Duration in milliseconds, 0 when it could not be determined
    pub duration_ms: u64,

    /// File name without extension
    pub display_name: String,

    /// Directory containing the file
    pub directory: PathBuf,

    /// Last modification time, used for ordering and retention
    pub modified: DateTime<Utc>,
}

impl RecordingRecord {
    /// Build a record from a file on disk.
    pub fn from_file(path: &Path, duration_ms: u64) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let modified: DateTime<Utc> = metadata.modified()?.into();

        Ok(Self {
            path: path.to_path_buf(),
            duration_ms,
            display_name: display_name(path),
            directory: path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| path.to_path_buf()),
            modified,
        })
    }

    /// File name including extension (the key used by the marker set)
    pub fn file_name(&self) -> String {
        file_name(&self.path)
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }

    /// True if the file physically lives in a `permanent` directory
    pub fn in_permanent_dir(&self) -> bool {
        in_permanent_dir(&self.path)
    }
}

/// True for regular-file names ending in one of [`SUPPORTED_EXTENSIONS`]
pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

pub fn in_permanent_dir(path: &Path) -> bool {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|name| name == PERMANENT_DIR_NAME)
        .unwrap_or(false)
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_audio(Path::new("/music/20240101_000000.mp4")));
        assert!(is_supported_audio(Path::new("/music/a.aac")));
        assert!(is_supported_audio(Path::new("/music/a.m4a")));
        assert!(!is_supported_audio(Path::new("/music/a.wav")));
        assert!(!is_supported_audio(Path::new("/music/notes.txt")));
        assert!(!is_supported_audio(Path::new("/music/mp4")));
        assert!(!is_supported_audio(Path::new("/music/A.MP4")));
    }

    #[test]
    fn test_permanent_dir_detection() {
        assert!(in_permanent_dir(Path::new("/music/permanent/a.mp4")));
        assert!(!in_permanent_dir(Path::new("/music/a.mp4")));
        assert!(!in_permanent_dir(Path::new("/permanent-ish/a.mp4")));
    }

    #[test]
    fn test_record_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("20240101_000000.mp4");
        std::fs::write(&path, b"data").unwrap();

        let record = RecordingRecord::from_file(&path, 5000).unwrap();
        assert_eq!(record.display_name, "20240101_000000");
        assert_eq!(record.file_name(), "20240101_000000.mp4");
        assert_eq!(record.extension(), Some("mp4"));
        assert_eq!(record.directory, dir.path());
        assert_eq!(record.duration_ms, 5000);
        assert!(!record.in_permanent_dir());
    }

    #[test]
    fn test_record_from_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(RecordingRecord::from_file(&dir.path().join("gone.mp4"), 0).is_err());
    }
}
