// Library error types

use std::path::PathBuf;

/// Error type for recording library operations
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("A file named {0} already exists")]
    NameCollision(String),

    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("Not a supported recording: {}", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("Recording not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to persist permanent markers: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
