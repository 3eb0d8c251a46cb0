//! Output paths for new recordings.
//!
//! Files are named `capture-<unix-ms>.wav` inside the recordings directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;

/// Hands out timestamped output paths that are never reused in this process
/// and never collide with a file already on disk.
pub struct OutputPaths {
    dir: PathBuf,
    last_stamp: Mutex<i64>,
}

impl OutputPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_stamp: Mutex::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the recordings directory and return a fresh output path.
    pub fn next(&self) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let mut last = self.last_stamp.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stamp = Utc::now().timestamp_millis().max(*last + 1);
        let mut path = self.path_for(stamp);
        while path.exists() {
            stamp += 1;
            path = self.path_for(stamp);
        }
        *last = stamp;
        Ok(path)
    }

    fn path_for(&self, stamp: i64) -> PathBuf {
        self.dir.join(format!("capture-{}.wav", stamp))
    }
}
