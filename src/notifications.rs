// Library change notifications and user-facing formatting

use crate::library::RecordingRecord;

/// Receives a notification after every operation that changed the lists.
/// The UI re-renders from the slices it is handed.
pub trait LibraryObserver: Send + Sync {
    fn lists_changed(&self, normal: &[RecordingRecord], permanent: &[RecordingRecord]);
}

/// Observer for headless use: logs list sizes
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LibraryObserver for LogObserver {
    fn lists_changed(&self, normal: &[RecordingRecord], permanent: &[RecordingRecord]) {
        log::debug!(
            "Recordings changed: {} normal, {} permanent",
            normal.len(),
            permanent.len()
        );
    }
}

/// Format elapsed recording time as MM:SS
pub fn format_elapsed(millis: u64) -> String {
    let total_secs = millis / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

/// Format duration as human-readable string
pub fn format_duration(secs: f64) -> String {
    let total_secs = secs as u64;
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

/// One line per recording, used by the headless binary's listing
pub fn describe_recording(record: &RecordingRecord) -> String {
    format!(
        "{}  {}  {}",
        record.modified.format("%Y-%m-%d %H:%M:%S"),
        format_duration(record.duration_ms as f64 / 1000.0),
        record.display_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(59_999), "00:59");
        assert_eq!(format_elapsed(61_000), "01:01");
        assert_eq!(format_elapsed(125 * 60 * 1000), "125:00");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5.0), "0:05");
        assert_eq!(format_duration(754.9), "12:34");
        assert_eq!(format_duration(3723.0), "1:02:03");
    }
}
