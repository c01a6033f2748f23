// Rabbit Recorder - background voice recorder with expiring and permanent recordings
// Main library entry point

pub mod commands;
pub mod config;
pub mod library;
pub mod notifications;
pub mod playback;
pub mod recording;
pub mod service;

use crate::config::Config;
use crate::library::{PermanentMarkers, RecordingStore};
use crate::notifications::describe_recording;
use crate::service::LibraryService;
use std::path::Path;

/// Build the recording store from the persisted settings and marker set
pub fn open_store(config: &Config) -> RecordingStore {
    open_store_at(config, &config::get_markers_path())
}

/// Build the store with the marker set at `markers_path`.
///
/// If the marker set cannot be read, no recording is known to be permanent,
/// so the store keeps every recording until the next start.
pub fn open_store_at(config: &Config, markers_path: &Path) -> RecordingStore {
    let markers = match PermanentMarkers::open(markers_path) {
        Ok(markers) => markers,
        Err(e) => {
            log::error!("Failed to open permanent markers {:?}: {}", markers_path, e);
            PermanentMarkers::unavailable()
        }
    };

    RecordingStore::new(config.storage_path.clone(), markers)
        .with_retention(config.retention())
}

/// Reload once and print both lists
pub fn run_once() {
    env_logger::init();

    let config = Config::load_or_default(&config::get_config_path());
    let mut store = open_store(&config);
    store.reload();

    println!("Recordings in {}", store.base_dir().display());
    println!("Normal ({}):", store.normal().len());
    for record in store.normal() {
        println!("  {}", describe_recording(record));
    }
    println!("Permanent ({}):", store.permanent().len());
    for record in store.permanent() {
        println!("  {}", describe_recording(record));
    }
}

/// Run the retention loop until Ctrl-C
pub fn run() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::load_or_default(&config::get_config_path());
    log::info!("Recordings directory: {:?}", config.storage_path);
    if config.retention().is_enabled() {
        log::info!("Keeping normal recordings for {} hours", config.keep_recordings_hours);
    } else {
        log::info!("Automatic deletion is off");
    }

    let mut service = LibraryService::new(open_store(&config));

    // No capture backend in headless mode; the sender stays alive so the
    // worker keeps its recorder arm open for the lifetime of the process.
    let (_events_tx, events_rx) = crossbeam_channel::unbounded();
    service.start(&config, events_rx);

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;

    log::info!("Rabbit Recorder running, press Ctrl-C to exit");
    let _ = stop_rx.recv();

    service.shutdown();
    log::info!("Rabbit Recorder stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> Config {
        Config {
            storage_path: dir.path().join("music"),
            keep_recordings_hours: 2.0,
            ..Config::default()
        }
    }

    fn old_recording(config: &Config, name: &str) -> std::path::PathBuf {
        std::fs::create_dir_all(&config.storage_path).unwrap();
        let path = config.storage_path.join(name);
        std::fs::write(&path, b"audio").unwrap();
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(3 * 3600)).unwrap();
        path
    }

    #[test]
    fn test_corrupt_marker_file_disables_expiry() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        let markers_path = dir.path().join("permanent_files.json");
        std::fs::write(&markers_path, r#"{"permanent_files":["keep.mp4""#).unwrap();
        let keep = old_recording(&config, "keep.mp4");

        let mut store = open_store_at(&config, &markers_path);
        store.reload();

        assert!(!store.markers().is_loaded());
        assert!(keep.exists());
        assert_eq!(store.normal().len(), 1);

        // Settings changes do not re-enable deletion either
        store.set_retention(config.retention());
        store.reload();
        assert!(keep.exists());
    }

    #[test]
    fn test_readable_marker_file_keeps_configured_retention() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        let markers_path = dir.path().join("permanent_files.json");
        std::fs::write(&markers_path, r#"{"permanent_files":["keep.mp4"]}"#).unwrap();
        let keep = old_recording(&config, "keep.mp4");
        let expired = old_recording(&config, "expired.mp4");

        let mut store = open_store_at(&config, &markers_path);
        store.reload();

        assert!(store.markers().is_loaded());
        assert!(keep.exists());
        assert!(!expired.exists());
        assert_eq!(store.permanent().len(), 1);
    }
}
