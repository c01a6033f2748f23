// Recorder controller: clip lifecycle, max-duration rotation and saved events

use super::{RecorderState, RecorderStatus};
use chrono::{DateTime, Local, Utc};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How often the watchdog checks elapsed time
const WATCHDOG_TICK: Duration = Duration::from_millis(100);

/// How often elapsed-time events are emitted
const ELAPSED_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Platform audio capture writing one clip to a file.
/// Provided by the host (microphone + AAC/MP4 encoder).
pub trait CaptureBackend: Send {
    fn start(&mut self, output: &Path) -> anyhow::Result<()>;

    /// Stop and finalize the current clip
    fn stop(&mut self) -> anyhow::Result<()>;
}

/// Events emitted by the recorder
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    /// A new clip started
    Started(PathBuf),
    /// Elapsed time of the current clip; 0 after the recorder stops
    Elapsed(u64),
    /// A clip was finalized and is ready to be added to the library
    Saved(PathBuf),
    /// Recording stopped because of an error
    Failed(String),
}

struct RecorderInner {
    backend: Box<dyn CaptureBackend>,
    state: RecorderState,
    clip_started: Option<Instant>,
}

/// Starts and stops clips and rotates them when the maximum clip length is reached.
pub struct RecorderController {
    inner: Arc<Mutex<RecorderInner>>,
    output_dir: PathBuf,
    max_clip: Option<Duration>,
    events: Sender<RecorderEvent>,
    /// Handle for the watchdog background thread
    watchdog_handle: Option<JoinHandle<()>>,
    watchdog_stop: Arc<AtomicBool>,
}

impl RecorderController {
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        output_dir: PathBuf,
        max_clip: Option<Duration>,
        events: Sender<RecorderEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecorderInner {
                backend,
                state: RecorderState::new(),
                clip_started: None,
            })),
            output_dir,
            max_clip,
            events,
            watchdog_handle: None,
            watchdog_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Applies to the next clip
    pub fn set_max_clip(&mut self, max_clip: Option<Duration>) {
        self.max_clip = max_clip;
    }

    pub fn set_output_dir(&mut self, output_dir: PathBuf) {
        self.output_dir = output_dir;
    }

    pub fn is_recording(&self) -> bool {
        self.inner.lock().state.is_recording()
    }

    pub fn state(&self) -> RecorderState {
        let inner = self.inner.lock();
        let mut state = inner.state.clone();
        if let Some(started) = inner.clip_started {
            state.elapsed_ms = started.elapsed().as_millis() as u64;
        }
        state
    }

    /// Start recording. Returns the path of the first clip.
    pub fn start(&mut self) -> anyhow::Result<PathBuf> {
        // A watchdog that exited on its own leaves a finished handle behind
        self.join_watchdog();

        let path = {
            let mut inner = self.inner.lock();
            if !inner.state.can_start_recording() {
                return Err(anyhow::anyhow!("Already recording"));
            }
            let path = start_clip(&mut inner, &self.output_dir, &self.events)?;
            inner.state.started_at = Some(Utc::now());
            path
        };

        self.start_watchdog();
        Ok(path)
    }

    /// Stop recording. Returns the saved clip, if one was finalized.
    pub fn stop(&mut self) -> Option<PathBuf> {
        self.join_watchdog();

        let mut inner = self.inner.lock();
        if inner.state.status != RecorderStatus::Recording {
            return None;
        }

        inner.state.status = RecorderStatus::Stopping;
        let saved = stop_clip(&mut inner, &self.events);
        inner.state = RecorderState::new();
        let _ = self.events.send(RecorderEvent::Elapsed(0));

        saved
    }

    fn start_watchdog(&mut self) {
        self.watchdog_stop.store(false, Ordering::SeqCst);
        let inner = self.inner.clone();
        let stop_flag = self.watchdog_stop.clone();
        let output_dir = self.output_dir.clone();
        let max_clip = self.max_clip;
        let events = self.events.clone();

        let handle = std::thread::Builder::new()
            .name("rabbit-recorder-watchdog".into())
            .spawn(move || {
                let mut last_report = Instant::now();
                loop {
                    std::thread::sleep(WATCHDOG_TICK);

                    if stop_flag.load(Ordering::SeqCst) {
                        break;
                    }

                    let mut guard = inner.lock();
                    if !guard.state.is_recording() {
                        break;
                    }
                    let Some(clip_started) = guard.clip_started else {
                        break;
                    };
                    let elapsed = clip_started.elapsed();

                    if last_report.elapsed() >= ELAPSED_REPORT_INTERVAL {
                        last_report = Instant::now();
                        let _ = events.send(RecorderEvent::Elapsed(elapsed.as_millis() as u64));
                    }

                    if let Some(max) = max_clip {
                        if elapsed >= max {
                            log::info!("Max clip duration reached, starting a new clip");
                            stop_clip(&mut guard, &events);
                            if let Err(e) = start_clip(&mut guard, &output_dir, &events) {
                                log::error!("Failed to start next clip: {}", e);
                                guard.state = RecorderState::new();
                                let _ = events.send(RecorderEvent::Elapsed(0));
                                break;
                            }
                            last_report = Instant::now();
                        }
                    }
                }
            });

        match handle {
            Ok(handle) => self.watchdog_handle = Some(handle),
            Err(e) => log::error!("Failed to spawn recorder watchdog thread: {}", e),
        }
    }

    fn join_watchdog(&mut self) {
        self.watchdog_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.watchdog_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RecorderController {
    fn drop(&mut self) {
        // Finalize the current clip so it is not left half-written
        self.stop();
    }
}

/// Start a new clip. On failure the recorder is back to idle and no file is left behind.
fn start_clip(
    inner: &mut RecorderInner,
    output_dir: &Path,
    events: &Sender<RecorderEvent>,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = unique_output_path(output_dir, Local::now());

    if let Err(e) = inner.backend.start(&path) {
        log::error!("Failed to start recording to {:?}: {}", path, e);
        if path.exists() {
            if let Err(rm) = std::fs::remove_file(&path) {
                log::warn!("Failed to remove incomplete clip {:?}: {}", path, rm);
            }
        }
        inner.state = RecorderState::new();
        inner.clip_started = None;
        let _ = events.send(RecorderEvent::Failed(e.to_string()));
        return Err(e);
    }

    log::info!("Recording started: {:?}", path);
    inner.state.status = RecorderStatus::Recording;
    inner.state.current_file = Some(path.clone());
    inner.state.elapsed_ms = 0;
    inner.clip_started = Some(Instant::now());
    let _ = events.send(RecorderEvent::Started(path.clone()));

    Ok(path)
}

/// Finalize the current clip and announce it. A clip whose backend failed to
/// stop cleanly is not announced.
fn stop_clip(inner: &mut RecorderInner, events: &Sender<RecorderEvent>) -> Option<PathBuf> {
    let path = inner.state.current_file.take()?;
    inner.clip_started = None;

    match inner.backend.stop() {
        Ok(()) => {
            log::info!("Recording saved: {:?}", path);
            let _ = events.send(RecorderEvent::Saved(path.clone()));
            Some(path)
        }
        Err(e) => {
            log::warn!("Failed to finalize {:?}: {}", path, e);
            None
        }
    }
}

/// Clip file name from the local time, e.g. `20240101_000000.mp4`.
/// Clips started within the same second get a numeric suffix.
pub fn unique_output_path(output_dir: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = now.format("%Y%m%d_%H%M%S").to_string();
    let candidate = output_dir.join(format!("{}.mp4", stem));
    if !candidate.exists() {
        return candidate;
    }

    (1..)
        .map(|n| output_dir.join(format!("{}_{}.mp4", stem, n)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
