use chrono::Utc;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::StoreError;

/// Exclusive guard for one run against a table.
///
/// The guard is an OS advisory lock on `<csv>.lock`, held for as long as the
/// file handle is open. The OS drops it when the holder exits for any reason,
/// so a killed run never blocks later ones. The file itself stays on disk and
/// only records the last holder.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if is_contended(&e) {
                return Err(StoreError::Locked(path));
            }
            return Err(e.into());
        }

        // leftovers from a previous holder are overwritten
        file.set_len(0)?;
        writeln!(file, "pid={} acquired_at={}", std::process::id(), Utc::now().to_rfc3339())?;
        debug!("Acquired lock {}", path.display());
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // closing the handle releases the lock anyway
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to unlock {}: {}", self.path.display(), e);
        } else {
            debug!("Released lock {}", self.path.display());
        }
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == ErrorKind::WouldBlock || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
