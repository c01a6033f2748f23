// Recording store: the two recording lists, classification and retention

use super::{
    display_name, file_name, in_permanent_dir, is_supported_audio, Category, DurationProbe,
    LibraryError, MediaProbe, PermanentMarkers, RecordingRecord, Result, PERMANENT_DIR_NAME,
};
use crate::config::RetentionPolicy;
use crate::notifications::{LibraryObserver, LogObserver};
use crate::playback::{NoPlayback, PlaybackController};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of a move to permanent storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The file was relocated and marked permanent
    Moved,
    /// The file was already permanent. Nothing was moved, the lists were reloaded.
    AlreadyPermanent,
}

/// Single source of truth for which recordings exist and which list each is in.
///
/// A recording is permanent if it lives in the `permanent` subdirectory or if its
/// file name is in the marker set. Classification is derived again on every reload.
/// All methods take `&mut self`; callers sharing a store across threads must
/// serialize access (see [`crate::service::LibraryService`]).
pub struct RecordingStore {
    base_dir: PathBuf,
    markers: PermanentMarkers,
    retention: RetentionPolicy,
    normal: Vec<RecordingRecord>,
    permanent: Vec<RecordingRecord>,
    playback: Arc<dyn PlaybackController>,
    observer: Arc<dyn LibraryObserver>,
    probe: Arc<dyn DurationProbe>,
}

impl RecordingStore {
    /// Create an empty store over `base_dir`. Call [`reload`](Self::reload) to populate it.
    pub fn new(base_dir: PathBuf, markers: PermanentMarkers) -> Self {
        Self {
            base_dir,
            markers,
            retention: RetentionPolicy::disabled(),
            normal: Vec::new(),
            permanent: Vec::new(),
            playback: Arc::new(NoPlayback),
            observer: Arc::new(LogObserver),
            probe: Arc::new(MediaProbe),
        }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_playback(mut self, playback: Arc<dyn PlaybackController>) -> Self {
        self.playback = playback;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LibraryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn DurationProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Takes effect on the next reload
    pub fn set_retention(&mut self, retention: RetentionPolicy) {
        self.retention = retention;
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn permanent_dir(&self) -> PathBuf {
        self.base_dir.join(PERMANENT_DIR_NAME)
    }

    /// Recordings subject to retention, newest first
    pub fn normal(&self) -> &[RecordingRecord] {
        &self.normal
    }

    /// Recordings exempt from retention, newest first
    pub fn permanent(&self) -> &[RecordingRecord] {
        &self.permanent
    }

    pub fn markers(&self) -> &PermanentMarkers {
        &self.markers
    }

    pub fn find(&self, path: &Path) -> Option<&RecordingRecord> {
        self.normal
            .iter()
            .chain(self.permanent.iter())
            .find(|r| r.path == path)
    }

    pub fn category_of(&self, path: &Path) -> Option<Category> {
        if self.permanent.iter().any(|r| r.path == path) {
            Some(Category::Permanent)
        } else if self.normal.iter().any(|r| r.path == path) {
            Some(Category::Normal)
        } else {
            None
        }
    }

    /// Where a move to permanent storage puts this recording by default
    pub fn permanent_destination(&self, record: &RecordingRecord) -> PathBuf {
        self.permanent_dir().join(record.file_name())
    }

    /// True if the record would be treated as already permanent by a move
    pub fn is_already_permanent(&self, record: &RecordingRecord) -> bool {
        record.in_permanent_dir() || self.markers.contains(&record.file_name())
    }

    fn is_permanent(&self, path: &Path) -> bool {
        in_permanent_dir(path) || self.markers.contains(&file_name(path))
    }

    // ========================================================================
    // Reload
    // ========================================================================

    /// Rebuild both lists from disk, deleting normal recordings older than the
    /// retention cutoff.
    pub fn reload(&mut self) {
        log::debug!("Reloading recordings from {:?}", self.base_dir);
        let was_playing = self.playback.currently_playing();

        if let Err(e) = self.markers.refresh() {
            log::warn!("Keeping previous permanent markers: {}", e);
        }

        self.normal.clear();
        self.permanent.clear();

        let cutoff = if self.markers.is_loaded() {
            self.retention.cutoff(Utc::now())
        } else {
            if self.retention.is_enabled() {
                log::warn!("Permanent markers unavailable, not deleting expired recordings");
            }
            None
        };
        match cutoff {
            Some(cutoff) => log::info!(
                "Deleting normal recordings modified before {}",
                cutoff.to_rfc3339()
            ),
            None => log::debug!("Retention is off, keeping all recordings"),
        }

        let mut expired = 0;
        for path in list_audio_files(&self.base_dir) {
            let is_permanent = self.is_permanent(&path);

            if !is_permanent {
                if let (Some(cutoff), Some(modified)) = (cutoff, modified_time(&path)) {
                    if modified < cutoff && self.expire(&path) {
                        expired += 1;
                        continue;
                    }
                }
            }

            // A marked file still in the base directory is listed as permanent.
            // It is not relocated here.
            if let Some(record) = self.build_record(&path) {
                if is_permanent {
                    self.permanent.push(record);
                } else {
                    self.normal.push(record);
                }
            }
        }

        for path in list_audio_files(&self.permanent_dir()) {
            if self.permanent.iter().any(|r| r.path == path) {
                continue;
            }
            if let Some(record) = self.build_record(&path) {
                self.permanent.push(record);
            }
        }

        // Marker entries may have been added without a reload in between
        let (marked, normal): (Vec<_>, Vec<_>) = std::mem::take(&mut self.normal)
            .into_iter()
            .partition(|r| !r.in_permanent_dir() && self.markers.contains(&r.file_name()));
        self.normal = normal;
        for record in marked {
            if !self.permanent.iter().any(|r| r.path == record.path) {
                self.permanent.push(record);
            }
        }

        sort_newest_first(&mut self.normal);
        sort_newest_first(&mut self.permanent);

        log::info!(
            "Loaded {} normal and {} permanent recordings ({} expired)",
            self.normal.len(),
            self.permanent.len(),
            expired
        );

        self.notify_changed();

        if let Some(playing) = was_playing {
            if self.find(&playing).is_none()
                && self.playback.currently_playing().as_deref() == Some(playing.as_path())
            {
                self.playback.stop();
            }
        }
    }

    /// Delete an expired recording. Returns false if the file is still on disk.
    fn expire(&self, path: &Path) -> bool {
        log::info!("Deleting expired recording {:?}", path);
        self.stop_if_playing(path);

        match std::fs::remove_file(path) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to delete expired recording {:?}: {}", path, e);
                false
            }
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert or refresh the record for a recording that was just saved,
    /// without rescanning the directories.
    pub fn add_or_update(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            log::warn!("Saved recording not found: {:?}", path);
            return Err(LibraryError::NotFound(path.to_path_buf()));
        }
        if !path.is_file() || !is_supported_audio(path) {
            log::warn!("Not a supported recording: {:?}", path);
            return Err(LibraryError::UnsupportedFile(path.to_path_buf()));
        }

        let duration_ms = self.duration_or_zero(path);
        if duration_ms == 0 {
            log::info!("{:?} has no readable duration, it may be empty or corrupted", path);
        }
        let record = RecordingRecord::from_file(path, duration_ms)?;

        // Drops a preliminary entry a scan may have inserted while the file was being written
        self.normal.retain(|r| r.path != path);
        self.permanent.retain(|r| r.path != path);

        let category = if self.is_permanent(path) {
            self.permanent.push(record);
            sort_newest_first(&mut self.permanent);
            Category::Permanent
        } else {
            self.normal.push(record);
            sort_newest_first(&mut self.normal);
            Category::Normal
        };

        log::info!(
            "Added recording {} ({} ms) to the {:?} list",
            display_name(path),
            duration_ms,
            category
        );

        self.notify_changed();
        Ok(())
    }

    /// Rename a recording within its directory, keeping its extension.
    /// Returns the new path.
    pub fn rename(&mut self, record: &RecordingRecord, new_base_name: &str) -> Result<PathBuf> {
        let new_base_name = new_base_name.trim();
        if new_base_name.is_empty() {
            return Err(LibraryError::EmptyName);
        }
        if new_base_name.contains(['/', '\\']) || new_base_name == "." || new_base_name == ".." {
            return Err(LibraryError::InvalidName(new_base_name.to_string()));
        }

        let parent = record
            .path
            .parent()
            .ok_or_else(|| LibraryError::NotFound(record.path.clone()))?;
        let new_file_name = match record.extension() {
            Some(ext) if !ext.is_empty() => format!("{}.{}", new_base_name, ext),
            _ => new_base_name.to_string(),
        };
        let new_path = parent.join(&new_file_name);

        if new_path.exists() {
            return Err(LibraryError::NameCollision(new_file_name));
        }

        self.stop_if_playing(&record.path);
        std::fs::rename(&record.path, &new_path)?;
        log::info!("Renamed {:?} to {:?}", record.path, new_path);

        let old_file_name = record.file_name();
        let marker_result = if self.markers.contains(&old_file_name) {
            self.markers
                .remove(&old_file_name)
                .and_then(|_| self.markers.insert(&new_file_name))
        } else {
            Ok(false)
        };

        self.reload();
        marker_result?;
        Ok(new_path)
    }

    /// Move a recording into the permanent directory and mark it permanent.
    ///
    /// With `overwrite`, an existing destination is replaced by the rename itself,
    /// so a failed move never loses the destination file.
    pub fn move_to_permanent(
        &mut self,
        record: &RecordingRecord,
        destination: &Path,
        overwrite: bool,
    ) -> Result<MoveOutcome> {
        if self.is_already_permanent(record) {
            log::info!("{} is already permanent", record.display_name);
            self.reload();
            return Ok(MoveOutcome::AlreadyPermanent);
        }

        if destination.exists() && !overwrite {
            return Err(LibraryError::DestinationExists(destination.to_path_buf()));
        }

        self.stop_if_playing(&record.path);

        if let Some(dir) = destination.parent() {
            std::fs::create_dir_all(dir)?;
        }

        if let Err(e) = std::fs::rename(&record.path, destination) {
            log::warn!(
                "Failed to move {:?} to {:?}: {}",
                record.path,
                destination,
                e
            );
            return Err(e.into());
        }
        log::info!("Moved {:?} to {:?}", record.path, destination);

        // A replaced destination keeps (or gains) its marker under the same name
        let marker_result = self.markers.insert(&file_name(destination));

        self.reload();
        marker_result?;
        Ok(MoveOutcome::Moved)
    }

    /// Delete a recording from disk and forget its permanent marker.
    pub fn delete(&mut self, record: &RecordingRecord) -> Result<()> {
        self.stop_if_playing(&record.path);

        if let Err(e) = std::fs::remove_file(&record.path) {
            log::warn!("Failed to delete {:?}: {}", record.path, e);
            return Err(e.into());
        }
        log::info!("Deleted {:?}", record.path);

        let marker_result = self.markers.remove(&record.file_name());

        self.reload();
        marker_result?;
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn stop_if_playing(&self, path: &Path) {
        if self.playback.currently_playing().as_deref() == Some(path) {
            log::debug!("Stopping playback of {:?}", path);
            self.playback.stop();
        }
    }

    fn duration_or_zero(&self, path: &Path) -> u64 {
        match self.probe.duration_ms(path) {
            Ok(ms) => ms,
            Err(e) => {
                log::info!("Could not read duration of {:?}: {}", path, e);
                0
            }
        }
    }

    fn build_record(&self, path: &Path) -> Option<RecordingRecord> {
        let duration_ms = self.duration_or_zero(path);
        match RecordingRecord::from_file(path, duration_ms) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping {:?}: {}", path, e);
                None
            }
        }
    }

    fn notify_changed(&self) {
        self.observer.lists_changed(&self.normal, &self.permanent);
    }
}

/// Supported audio files directly inside `dir`. A missing directory is empty.
fn list_audio_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot read {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported_audio(path))
        .collect()
}

fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Newest first; ties ordered by path so repeated reloads are identical
fn sort_newest_first(records: &mut [RecordingRecord]) {
    records.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
}
