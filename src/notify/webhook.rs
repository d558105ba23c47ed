use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use super::NotificationSink;
use crate::models::TableSummary;

/// POSTs the summary as JSON to a webhook URL
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("sp500-updater/0.1")
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl NotificationSink for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, summary: &TableSummary) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(summary)
            .send()
            .await
            .with_context(|| format!("webhook request to {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("webhook responded with status {}", status));
        }

        info!("📡 Summary sent to webhook");
        Ok(())
    }
}
