// Playback capability consumed by the library

use std::path::PathBuf;

/// What the library needs to know about playback.
///
/// Destructive operations stop playback first when they touch the file
/// that is currently playing.
pub trait PlaybackController: Send + Sync {
    /// Absolute path of the recording being played, if any
    fn currently_playing(&self) -> Option<PathBuf>;

    fn stop(&self);
}

/// Headless hosts never play anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPlayback;

impl PlaybackController for NoPlayback {
    fn currently_playing(&self) -> Option<PathBuf> {
        None
    }

    fn stop(&self) {}
}
