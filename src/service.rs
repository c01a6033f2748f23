// Library service: serialized owner of the recording store
//
// Every store operation goes through one mutex. The worker thread reloads on a
// timer and adds clips announced by the recorder; command handlers lock the
// same mutex, so a reload never interleaves with a rename, move or delete.

use crate::config::Config;
use crate::library::RecordingStore;
use crate::recording::RecorderEvent;
use crossbeam_channel::{bounded, never, select, tick, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Store shared between the worker thread and command handlers
pub type SharedStore = Arc<Mutex<RecordingStore>>;

pub struct LibraryService {
    store: SharedStore,
    shutdown_tx: Option<Sender<()>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl LibraryService {
    pub fn new(store: RecordingStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            shutdown_tx: None,
            worker_handle: None,
        }
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Run `f` with exclusive access to the store
    pub fn with_store<T>(&self, f: impl FnOnce(&mut RecordingStore) -> T) -> T {
        let mut store = self.store.lock();
        f(&mut store)
    }

    /// Apply settings that affect the store. Retention takes effect on the next reload.
    pub fn apply_config(&self, config: &Config) {
        self.store.lock().set_retention(config.retention());
    }

    /// Start the worker: reload now, then on every `refresh_interval`, and add
    /// each clip the recorder saves after `save_settle_delay`.
    pub fn start(&mut self, config: &Config, recorder_events: Receiver<RecorderEvent>) {
        self.shutdown();
        self.apply_config(config);

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let store = self.store.clone();
        let interval = config.refresh_interval();
        let settle = config.save_settle_delay();

        let handle = std::thread::Builder::new()
            .name("rabbit-library-worker".into())
            .spawn(move || run_worker(store, interval, settle, recorder_events, shutdown_rx));

        match handle {
            Ok(handle) => {
                self.worker_handle = Some(handle);
                self.shutdown_tx = Some(shutdown_tx);
                log::info!("Library worker started, reloading every {:?}", interval);
            }
            Err(e) => log::error!("Failed to spawn library worker thread: {}", e),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker_handle.is_some()
    }

    /// Stop the worker and wait for it to exit
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
            log::info!("Library worker stopped");
        }
    }
}

impl Drop for LibraryService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum WorkerMessage {
    Shutdown,
    Tick,
    Recorder(Option<RecorderEvent>),
}

fn run_worker(
    store: SharedStore,
    interval: Duration,
    settle: Duration,
    mut recorder_events: Receiver<RecorderEvent>,
    shutdown_rx: Receiver<()>,
) {
    store.lock().reload();

    let ticker = tick(interval);

    loop {
        let message = select! {
            recv(shutdown_rx) -> _ => WorkerMessage::Shutdown,
            recv(ticker) -> _ => WorkerMessage::Tick,
            recv(recorder_events) -> event => WorkerMessage::Recorder(event.ok()),
        };

        match message {
            WorkerMessage::Shutdown => break,
            WorkerMessage::Tick => store.lock().reload(),
            WorkerMessage::Recorder(Some(RecorderEvent::Saved(path))) => {
                // Let the container be finalized before reading its duration
                if shutdown_rx.recv_timeout(settle).is_ok() {
                    break;
                }
                if let Err(e) = store.lock().add_or_update(&path) {
                    log::warn!("Could not add saved recording {:?}: {}", path, e);
                }
            }
            WorkerMessage::Recorder(Some(RecorderEvent::Failed(message))) => {
                log::warn!("Recorder failed: {}", message);
            }
            WorkerMessage::Recorder(Some(_)) => {}
            WorkerMessage::Recorder(None) => {
                log::debug!("Recorder event channel closed");
                recorder_events = never();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{DurationProbe, PermanentMarkers};
    use crossbeam_channel::unbounded;
    use std::path::Path;
    use std::time::Instant;
    use tempfile::TempDir;

    struct FixedProbe(u64);

    impl DurationProbe for FixedProbe {
        fn duration_ms(&self, _path: &Path) -> anyhow::Result<u64> {
            Ok(self.0)
        }
    }

    fn test_config(dir: &TempDir) -> Config {
        Config {
            storage_path: dir.path().to_path_buf(),
            keep_recordings_hours: 0.0,
            max_recording_minutes: 0.0,
            refresh_interval_secs: 3600,
            save_settle_ms: 10,
        }
    }

    fn wait_for(service: &LibraryService, condition: impl Fn(&RecordingStore) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if service.with_store(|store| condition(store)) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn test_worker_reloads_on_start() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        let config = test_config(&dir);
        let store = RecordingStore::new(config.storage_path.clone(), PermanentMarkers::in_memory())
            .with_probe(Arc::new(FixedProbe(1000)));
        let mut service = LibraryService::new(store);
        let (_tx, rx) = unbounded();

        service.start(&config, rx);

        assert!(service.is_running());
        assert!(wait_for(&service, |store| store.normal().len() == 1));
        service.shutdown();
        assert!(!service.is_running());
    }

    #[test]
    fn test_saved_clip_is_added() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let store = RecordingStore::new(config.storage_path.clone(), PermanentMarkers::in_memory())
            .with_probe(Arc::new(FixedProbe(5000)));
        let mut service = LibraryService::new(store);
        let (tx, rx) = unbounded();
        service.start(&config, rx);

        let clip = dir.path().join("20240101_000000.mp4");
        std::fs::write(&clip, b"audio").unwrap();
        tx.send(RecorderEvent::Saved(clip.clone())).unwrap();

        assert!(wait_for(&service, |store| {
            store.find(&clip).map(|r| r.duration_ms) == Some(5000)
        }));
    }

    #[test]
    fn test_worker_keeps_running_after_recorder_disconnects() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.refresh_interval_secs = 1;
        let store = RecordingStore::new(config.storage_path.clone(), PermanentMarkers::in_memory())
            .with_probe(Arc::new(FixedProbe(0)));
        let mut service = LibraryService::new(store);
        let (tx, rx) = unbounded();
        service.start(&config, rx);
        drop(tx);

        std::fs::write(dir.path().join("late.m4a"), b"late").unwrap();
        assert!(wait_for(&service, |store| store.normal().len() == 1));
    }

    #[test]
    fn test_apply_config_updates_retention() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        let service = LibraryService::new(RecordingStore::new(
            config.storage_path.clone(),
            PermanentMarkers::in_memory(),
        ));

        config.keep_recordings_hours = 2.0;
        service.apply_config(&config);

        assert!(service.with_store(|store| store.retention().is_enabled()));
    }
}
