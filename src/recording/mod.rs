// Recording modules

pub mod controller;

pub use controller::{CaptureBackend, RecorderController, RecorderEvent};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current recorder status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecorderStatus {
    /// Ready to record
    Idle,
    /// Currently recording
    Recording,
    /// Stopping a recording (finalizing the clip)
    Stopping,
}

/// Snapshot of the recorder for the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderState {
    pub status: RecorderStatus,
    /// When the current session (possibly spanning several clips) started
    pub started_at: Option<DateTime<Utc>>,
    /// File the current clip is written to
    pub current_file: Option<PathBuf>,
    /// Elapsed time of the current clip
    pub elapsed_ms: u64,
}

impl RecorderState {
    pub fn new() -> Self {
        Self {
            status: RecorderStatus::Idle,
            started_at: None,
            current_file: None,
            elapsed_ms: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.status == RecorderStatus::Recording
    }

    /// Check if the recorder is ready to start recording
    pub fn can_start_recording(&self) -> bool {
        self.status == RecorderStatus::Idle
    }
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::new()
    }
}
