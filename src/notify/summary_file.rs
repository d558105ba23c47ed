use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use super::NotificationSink;
use crate::models::TableSummary;
use crate::storage::write_atomic;

/// Side-car JSON file describing the published table
#[derive(Debug, Serialize)]
struct SummaryFile<'a> {
    file_name: &'a str,
    description: &'a str,
    #[serde(flatten)]
    summary: &'a TableSummary,
}

/// Writes a JSON info file next to the table after each update
pub struct SummaryFileWriter {
    path: PathBuf,
    file_name: String,
    description: String,
}

impl SummaryFileWriter {
    pub fn new(path: impl Into<PathBuf>, file_name: impl Into<String>, symbol: &str) -> Self {
        Self {
            path: path.into(),
            file_name: file_name.into(),
            description: format!("{} opening prices updated daily", symbol),
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for SummaryFileWriter {
    fn name(&self) -> &str {
        "summary file"
    }

    async fn notify(&self, summary: &TableSummary) -> Result<()> {
        let info = SummaryFile {
            file_name: &self.file_name,
            description: &self.description,
            summary,
        };
        let json = serde_json::to_vec_pretty(&info)?;
        write_atomic(&self.path, &json)?;
        info!("📋 Summary written to {}", self.path.display());
        Ok(())
    }
}
