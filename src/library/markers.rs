// Persisted set of file names marked permanent

use super::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct MarkerFile {
    #[serde(default)]
    permanent_files: BTreeSet<String>,
}

/// File names (not paths) flagged permanent independent of where the file lives.
///
/// Survives renames and moves because the library rewrites the entry whenever
/// it renames or relocates a marked file.
#[derive(Debug)]
pub struct PermanentMarkers {
    names: BTreeSet<String>,
    /// `None` keeps the set in memory only
    path: Option<PathBuf>,
    /// False when the persisted set could not be loaded
    loaded: bool,
}

impl PermanentMarkers {
    /// Open or create the marker file
    pub fn open(path: &Path) -> Result<Self> {
        let names = read_names(path)?;
        log::debug!("Loaded {} permanent markers from {:?}", names.len(), path);

        Ok(Self {
            names,
            path: Some(path.to_path_buf()),
            loaded: true,
        })
    }

    /// Re-read the marker file, picking up edits made outside this process.
    /// On error the current set is kept.
    pub fn refresh(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        self.names = read_names(path)?;
        Ok(())
    }

    /// Marker set that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            names: BTreeSet::new(),
            path: None,
            loaded: true,
        }
    }

    /// Stand-in for a marker file that failed to load. Behaves like an empty
    /// in-memory set, but [`is_loaded`](Self::is_loaded) is false so callers
    /// can refuse to expire recordings.
    pub fn unavailable() -> Self {
        Self {
            loaded: false,
            ..Self::in_memory()
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.names.contains(file_name)
    }

    /// Returns true if the set changed
    pub fn insert(&mut self, file_name: &str) -> Result<bool> {
        if !self.names.insert(file_name.to_string()) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Returns true if the set changed. Removing an absent name is a no-op.
    pub fn remove(&mut self, file_name: &str) -> Result<bool> {
        if !self.names.remove(file_name) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Write the set using temp file + rename so a crash never leaves a torn file
    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| LibraryError::Persistence(e.to_string()))?;
        }

        let contents = serde_json::to_string_pretty(&MarkerFile {
            permanent_files: self.names.clone(),
        })
        .map_err(|e| LibraryError::Persistence(e.to_string()))?;

        let temp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path).map_err(|e| {
                LibraryError::Persistence(format!("Failed to create temp file: {}", e))
            })?;
            file.write_all(contents.as_bytes())
                .map_err(|e| LibraryError::Persistence(format!("Failed to write: {}", e)))?;
            file.sync_all()
                .map_err(|e| LibraryError::Persistence(format!("Failed to sync: {}", e)))?;
        }

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            LibraryError::Persistence(format!("Failed to rename: {}", e))
        })?;

        Ok(())
    }
}

fn read_names(path: &Path) -> Result<BTreeSet<String>> {
    if !path.exists() {
        return Ok(BTreeSet::new());
    }

    let contents =
        fs::read_to_string(path).map_err(|e| LibraryError::Persistence(e.to_string()))?;
    let file: MarkerFile =
        serde_json::from_str(&contents).map_err(|e| LibraryError::Persistence(e.to_string()))?;
    Ok(file.permanent_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_markers_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings").join("permanent_files.json");

        let mut markers = PermanentMarkers::open(&path).unwrap();
        assert!(markers.is_empty());
        assert!(markers.insert("a.mp4").unwrap());
        assert!(markers.insert("b.m4a").unwrap());
        assert!(!markers.insert("a.mp4").unwrap());
        assert!(markers.remove("b.m4a").unwrap());

        let reopened = PermanentMarkers::open(&path).unwrap();
        assert!(reopened.contains("a.mp4"));
        assert!(!reopened.contains("b.m4a"));
        assert_eq!(reopened.len(), 1);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_remove_absent_name_is_noop() {
        let mut markers = PermanentMarkers::in_memory();
        assert!(!markers.remove("never.mp4").unwrap());
        assert!(markers.is_empty());
    }

    #[test]
    fn test_corrupt_marker_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("permanent_files.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            PermanentMarkers::open(&path),
            Err(LibraryError::Persistence(_))
        ));
    }

    #[test]
    fn test_refresh_picks_up_external_edits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("permanent_files.json");
        let mut markers = PermanentMarkers::open(&path).unwrap();
        markers.insert("a.mp4").unwrap();

        fs::write(&path, r#"{"permanent_files": ["b.mp4"]}"#).unwrap();
        markers.refresh().unwrap();

        assert!(!markers.contains("a.mp4"));
        assert!(markers.contains("b.mp4"));
    }

    #[test]
    fn test_refresh_keeps_set_when_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("permanent_files.json");
        let mut markers = PermanentMarkers::open(&path).unwrap();
        markers.insert("a.mp4").unwrap();

        fs::write(&path, r#"{"permanent_files": ["a.mp4""#).unwrap();

        assert!(matches!(markers.refresh(), Err(LibraryError::Persistence(_))));
        assert!(markers.contains("a.mp4"));
    }

    #[test]
    fn test_refresh_in_memory_is_noop() {
        let mut markers = PermanentMarkers::in_memory();
        markers.insert("a.mp4").unwrap();
        markers.refresh().unwrap();
        assert!(markers.contains("a.mp4"));
    }

    #[test]
    fn test_unavailable_set_is_empty_and_not_loaded() {
        let mut markers = PermanentMarkers::unavailable();
        assert!(markers.is_empty());
        assert!(!markers.is_loaded());
        assert!(markers.insert("a.mp4").unwrap());
        assert!(!markers.is_loaded());
        assert!(PermanentMarkers::in_memory().is_loaded());
    }

    #[test]
    fn test_names_are_sorted() {
        let mut markers = PermanentMarkers::in_memory();
        markers.insert("z.mp4").unwrap();
        markers.insert("a.mp4").unwrap();
        assert_eq!(markers.names().collect::<Vec<_>>(), vec!["a.mp4", "z.mp4"]);
    }
}
