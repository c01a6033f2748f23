// Configuration management for Rabbit Recorder

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Base directory where recordings are stored.
    /// Permanent recordings live in its `permanent` subdirectory.
    pub storage_path: PathBuf,

    /// Hours to keep normal recordings before they are deleted on the next reload.
    /// 0 or less keeps them forever.
    #[serde(default)]
    pub keep_recordings_hours: f32,

    /// Maximum length of a single clip in minutes. When reached, the recorder
    /// saves the clip and starts a new one. 0 or less means unlimited.
    #[serde(default = "default_max_recording_minutes")]
    pub max_recording_minutes: f32,

    /// Interval between periodic library reloads
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Delay after a clip is saved before it is added to the library,
    /// so the container has been finalized on disk
    #[serde(default = "default_save_settle_ms")]
    pub save_settle_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: get_default_storage_path(),
            keep_recordings_hours: 0.0,
            max_recording_minutes: default_max_recording_minutes(),
            refresh_interval_secs: default_refresh_interval_secs(),
            save_settle_ms: default_save_settle_ms(),
        }
    }
}

impl Config {
    /// Load config from disk or return default
    pub fn load_or_default(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => {
                        log::warn!("Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read config file: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Save config to disk
    pub fn save(&self, config_path: &Path) -> anyhow::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(config_path, contents)?;

        Ok(())
    }

    /// Retention policy derived from `keep_recordings_hours`
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::from_hours(self.keep_recordings_hours)
    }

    /// Maximum single-clip duration, `None` when unlimited
    pub fn max_clip_duration(&self) -> Option<Duration> {
        if self.max_recording_minutes > 0.0 {
            Some(Duration::from_secs_f64(self.max_recording_minutes as f64 * 60.0))
        } else {
            None
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn save_settle_delay(&self) -> Duration {
        Duration::from_millis(self.save_settle_ms)
    }
}

/// Maximum age after which a normal recording is deleted.
/// Only applied when the library is reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    max_age: Option<chrono::Duration>,
}

impl RetentionPolicy {
    /// Keep everything forever
    pub fn disabled() -> Self {
        Self { max_age: None }
    }

    pub fn from_hours(hours: f32) -> Self {
        if hours > 0.0 && hours.is_finite() {
            let millis = (hours as f64 * 60.0 * 60.0 * 1000.0) as i64;
            Self { max_age: Some(chrono::Duration::milliseconds(millis)) }
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_age.is_some()
    }

    pub fn max_age(&self) -> Option<chrono::Duration> {
        self.max_age
    }

    /// Files last modified before the cutoff are eligible for deletion
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_age.map(|age| now - age)
    }
}

/// Get the default storage path for recordings
fn get_default_storage_path() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Music")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("RabbitRecorder")
}

/// Directory holding config.toml and the permanent marker file
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rabbit-recorder")
}

/// Get the config file path
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

/// Get the permanent marker file path
pub fn get_markers_path() -> PathBuf {
    get_config_dir().join("permanent_files.json")
}

/// Default max clip length (for serde)
fn default_max_recording_minutes() -> f32 {
    10.0
}

/// Default periodic reload interval, 5 minutes (for serde)
fn default_refresh_interval_secs() -> u64 {
    300
}

/// Default settle delay after a clip is saved (for serde)
fn default_save_settle_ms() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_retention_disabled_for_non_positive_hours() {
        assert!(!RetentionPolicy::from_hours(0.0).is_enabled());
        assert!(!RetentionPolicy::from_hours(-3.5).is_enabled());
        assert!(!RetentionPolicy::from_hours(f32::NAN).is_enabled());
        assert_eq!(RetentionPolicy::from_hours(0.0).cutoff(Utc::now()), None);
    }

    #[test]
    fn test_retention_cutoff_subtracts_max_age() {
        let now = Utc::now();
        let policy = RetentionPolicy::from_hours(2.0);
        assert_eq!(policy.cutoff(now), Some(now - chrono::Duration::hours(2)));

        let half_hour = RetentionPolicy::from_hours(0.5);
        assert_eq!(half_hour.max_age(), Some(chrono::Duration::minutes(30)));
    }

    #[test]
    fn test_max_clip_duration() {
        let mut config = Config::default();
        config.max_recording_minutes = 1.5;
        assert_eq!(config.max_clip_duration(), Some(Duration::from_secs(90)));

        config.max_recording_minutes = 0.0;
        assert_eq!(config.max_clip_duration(), None);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            storage_path: dir.path().join("recordings"),
            keep_recordings_hours: 12.0,
            max_recording_minutes: 3.0,
            refresh_interval_secs: 60,
            save_settle_ms: 250,
        };
        config.save(&path).unwrap();

        assert_eq!(Config::load_or_default(&path), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "storage_path = \"/tmp/rec\"\n").unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.storage_path, PathBuf::from("/tmp/rec"));
        assert_eq!(config.keep_recordings_hours, 0.0);
        assert_eq!(config.max_recording_minutes, 10.0);
        assert_eq!(config.refresh_interval_secs, 300);
        assert_eq!(config.save_settle_ms, 500);
    }

    #[test]
    fn test_unparsable_config_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        assert_eq!(Config::load_or_default(&path), Config::default());
    }
}
