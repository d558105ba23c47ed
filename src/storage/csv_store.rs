use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::codec::{self, RepairReport};
use super::{write_atomic, StoreError, TableStore};
use crate::models::Table;

/// Table stored as a CSV file on the local filesystem
#[derive(Debug, Clone)]
pub struct CsvFileStore {
    path: PathBuf,
}

impl CsvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock file guarding runs against this table
    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, "bak")
    }

    fn read_bytes(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_table(&self, table: &Table) -> Result<(), StoreError> {
        let bytes = codec::encode(table)?;

        // the file must read back as exactly this table
        let check = codec::decode(&bytes)?;
        if check != *table {
            return Err(StoreError::Invalid(format!(
                "encoded table for {} does not read back identically",
                self.path.display()
            )));
        }

        write_atomic(&self.path, &bytes)?;
        debug!("Wrote {} rows to {}", table.len(), self.path.display());
        Ok(())
    }

    /// Rewrite the file keeping every row that parses. Unparseable rows are
    /// dropped and listed in the report.
    pub fn repair(&self) -> Result<RepairReport, StoreError> {
        let Some(bytes) = self.read_bytes()? else {
            info!("📄 No table at {}, nothing to repair", self.path.display());
            return Ok(RepairReport::default());
        };

        let (table, report) = codec::decode_lenient(&bytes)?;
        for issue in &report.skipped {
            warn!("Dropping line {}: {}", issue.line, issue.message);
        }
        if report.is_clean() {
            info!("✅ {} is clean ({} rows)", self.path.display(), report.kept);
        }

        self.write_table(&table)?;
        info!(
            "🔧 Repaired {}: {} rows kept, {} skipped, {} duplicates removed",
            self.path.display(),
            report.kept,
            report.skipped.len(),
            report.duplicates_removed
        );
        Ok(report)
    }

    /// Replace the table with an empty one, keeping the previous file as
    /// `<path>.bak`. Returns the backup path when a backup was made.
    pub fn reset(&self) -> Result<Option<PathBuf>, StoreError> {
        let backup = if self.path.exists() {
            let backup = self.backup_path();
            fs::copy(&self.path, &backup)?;
            info!("💾 Previous table saved to {}", backup.display());
            Some(backup)
        } else {
            None
        };

        self.write_table(&Table::new())?;
        info!("🧹 Reset {} to an empty table", self.path.display());
        Ok(backup)
    }
}

#[async_trait::async_trait]
impl TableStore for CsvFileStore {
    async fn read(&self) -> Result<Option<Table>, StoreError> {
        let Some(bytes) = self.read_bytes()? else {
            return Ok(None);
        };
        let table = codec::decode(&bytes)?;
        debug!("Loaded {} rows from {}", table.len(), self.path.display());
        Ok(Some(table))
    }

    async fn write(&self, table: &Table) -> Result<(), StoreError> {
        self.write_table(table)
    }
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
