use anyhow::Result;

use crate::models::TableSummary;

pub mod summary_file;
pub mod webhook;

pub use summary_file::SummaryFileWriter;
pub use webhook::WebhookNotifier;

/// Receiver of the post-write summary. Failures are logged by the caller and
/// never fail a run.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, summary: &TableSummary) -> Result<()>;
}
