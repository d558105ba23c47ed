use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Table;

pub mod codec;
pub mod csv_store;
pub mod lock;

pub use codec::{RepairReport, RowIssue};
pub use csv_store::CsvFileStore;
pub use lock::RunLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unexpected header {0}, expected date,opening_price")]
    Header(String),

    #[error("line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("refusing to write invalid table: {0}")]
    Invalid(String),

    #[error("failed to replace file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("another run holds the lock file {0}")]
    Locked(PathBuf),
}

/// Persistent home of the price table
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TableStore: Send + Sync {
    /// Current table, or `None` when nothing has been stored yet
    async fn read(&self) -> Result<Option<Table>, StoreError>;

    /// Replace the stored table with `table`. Either the whole table is
    /// written or the previous contents are left untouched.
    async fn write(&self, table: &Table) -> Result<(), StoreError>;
}

/// Replace `path` with `bytes` through a temp file in the same directory
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}
