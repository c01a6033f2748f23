// Commands invoked by the UI layer

use crate::config::Config;
use crate::library::{LibraryError, MoveOutcome, RecordingRecord, RecordingStore};
use crate::recording::{RecorderController, RecorderState};
use crate::service::LibraryService;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application state the commands operate on
pub struct AppState {
    pub config: RwLock<Config>,
    pub config_path: PathBuf,
    pub library: LibraryService,
    pub recorder: Mutex<RecorderController>,
}

// ============================================================================
// Recording Commands
// ============================================================================

pub fn get_recorder_state(state: &AppState) -> RecorderState {
    state.recorder.lock().state()
}

pub fn start_recording(state: &AppState) -> Result<String, String> {
    let mut recorder = state.recorder.lock();
    if recorder.is_recording() {
        return Err("Already recording".to_string());
    }

    let path = recorder.start().map_err(|e| e.to_string())?;
    Ok(path.to_string_lossy().to_string())
}

/// The saved clip reaches the library through the recorder's event channel
pub fn stop_recording(state: &AppState) -> Result<(), String> {
    let mut recorder = state.recorder.lock();
    if !recorder.is_recording() {
        return Err("Not recording".to_string());
    }
    recorder.stop();
    Ok(())
}

// ============================================================================
// Library Commands
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingLists {
    pub normal: Vec<RecordingRecord>,
    pub permanent: Vec<RecordingRecord>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoveResponse {
    Moved,
    AlreadyPermanent,
    /// A file with the same name is already in permanent storage.
    /// Ask the user, then call again with `overwrite = true`.
    NeedsOverwriteConfirmation,
}

pub fn list_recordings(state: &AppState) -> RecordingLists {
    state.library.with_store(|store| RecordingLists {
        normal: store.normal().to_vec(),
        permanent: store.permanent().to_vec(),
    })
}

pub fn refresh_recordings(state: &AppState) -> RecordingLists {
    state.library.with_store(|store| store.reload());
    list_recordings(state)
}

pub fn rename_recording(
    state: &AppState,
    path: String,
    new_name: String,
) -> Result<String, String> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(LibraryError::EmptyName.to_string());
    }

    state.library.with_store(|store| {
        let record = find_record(store, Path::new(&path))?;
        store
            .rename(&record, new_name)
            .map(|p| p.to_string_lossy().to_string())
            .map_err(|e| e.to_string())
    })
}

pub fn move_recording_to_permanent(
    state: &AppState,
    path: String,
    overwrite: bool,
) -> Result<MoveResponse, String> {
    state.library.with_store(|store| {
        let record = find_record(store, Path::new(&path))?;

        let destination = store.permanent_destination(&record);
        if destination.exists() && !overwrite && !store.is_already_permanent(&record) {
            return Ok(MoveResponse::NeedsOverwriteConfirmation);
        }

        match store.move_to_permanent(&record, &destination, overwrite) {
            Ok(MoveOutcome::Moved) => Ok(MoveResponse::Moved),
            Ok(MoveOutcome::AlreadyPermanent) => Ok(MoveResponse::AlreadyPermanent),
            Err(e) => Err(e.to_string()),
        }
    })
}

pub fn delete_recording(state: &AppState, path: String) -> Result<(), String> {
    state.library.with_store(|store| {
        let record = find_record(store, Path::new(&path))?;
        store.delete(&record).map_err(|e| e.to_string())
    })
}

fn find_record(store: &RecordingStore, path: &Path) -> Result<RecordingRecord, String> {
    store
        .find(path)
        .cloned()
        .ok_or_else(|| LibraryError::NotFound(path.to_path_buf()).to_string())
}

// ============================================================================
// Config Commands
// ============================================================================

pub fn get_config(state: &AppState) -> Config {
    state.config.read().clone()
}

/// Persist new settings. Retention applies from the next reload, the clip
/// length from the next clip.
pub fn update_config(state: &AppState, new_config: Config) -> Result<(), String> {
    new_config.save(&state.config_path).map_err(|e| e.to_string())?;

    {
        let mut config = state.config.write();
        *config = new_config.clone();
    }

    state.library.apply_config(&new_config);
    state.recorder.lock().set_max_clip(new_config.max_clip_duration());

    Ok(())
}
