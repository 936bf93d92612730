//! Scoped temporary snapshot files.

use std::io;
use std::path::{Path, PathBuf};

/// Temporary file receiving one captured frame.
///
/// The file belongs to a single loop iteration. It is removed when the
/// snapshot is read, or when the guard is dropped on any other path.
#[derive(Debug)]
pub struct CaptureFile {
    path: PathBuf,
    removed: bool,
}

impl CaptureFile {
    /// Wraps `path`; nothing is created on disk yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            removed: false,
        }
    }

    /// Destination the capture tool writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole snapshot into memory and deletes the file.
    ///
    /// Deletion is attempted exactly once whether or not the read
    /// succeeded.
    pub async fn read_and_remove(mut self) -> io::Result<Vec<u8>> {
        let data = tokio::fs::read(&self.path).await;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove snapshot file");
            }
        }
        self.removed = true;
        data
    }
}

impl Drop for CaptureFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed unused snapshot file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove snapshot file")
            }
        }
    }
}

/// Hands out a distinct file name for every iteration.
#[derive(Debug)]
pub struct CaptureFileNamer {
    dir: PathBuf,
    sequence: u64,
}

impl CaptureFileNamer {
    /// Creates a namer placing files in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: 0,
        }
    }

    /// Returns a guard for the next unused path.
    pub fn next_file(&mut self) -> CaptureFile {
        self.sequence += 1;
        let name = format!(
            "prusa-snap-{}-{}-{}.jpg",
            std::process::id(),
            self.sequence,
            chrono::Utc::now().timestamp_millis()
        );
        CaptureFile::new(self.dir.join(name))
    }
}
