use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::api::{PriceSource, SourceError};
use crate::models::{Record, SyncReport, Table, TradingStatus};
use crate::notify::NotificationSink;
use crate::storage::{StoreError, TableStore};
use crate::utils::MarketCalendar;

/// Terminal failures of a sync run. None of them leave a partial write.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("failed to load stored table: {0}")]
    Load(#[source] StoreError),

    #[error("no trading data for {symbol} on {date}")]
    NoData { symbol: String, date: NaiveDate },

    #[error("price source failed: {0}")]
    Source(#[source] SourceError),

    #[error("failed to persist table: {0}")]
    Persist(#[source] StoreError),
}

/// Either the synced row or the reason the run failed
pub type Outcome = Result<SyncReport, UpdateError>;

/// Sync-one-row routine: makes sure the table holds the opening price of
/// the latest trading day.
pub struct Updater {
    source: Box<dyn PriceSource>,
    store: Box<dyn TableStore>,
    sinks: Vec<Box<dyn NotificationSink>>,
    timezone: Tz,
}

impl Updater {
    pub fn new(source: Box<dyn PriceSource>, store: Box<dyn TableStore>, timezone: Tz) -> Self {
        Self {
            source,
            store,
            sinks: Vec::new(),
            timezone,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Run against today's date on the exchange clock
    pub async fn run(&self) -> Outcome {
        let today = MarketCalendar::exchange_today(self.timezone);
        self.run_for(today).await
    }

    /// Run as if the exchange date were `today`
    pub async fn run_for(&self, today: NaiveDate) -> Outcome {
        let symbol = self.source.symbol().to_string();
        info!("🚀 Starting {} update for {}", symbol, today);

        let outcome = self.sync(&symbol, today).await;
        match &outcome {
            Ok(report) => info!(
                "✅ Update finished: {} - {} ({})",
                report.date, report.price, report.status
            ),
            Err(e) => error!("❌ Update failed: {}", e),
        }
        outcome
    }

    async fn sync(&self, symbol: &str, today: NaiveDate) -> Outcome {
        let mut table = self.load().await?;

        let target = MarketCalendar::target_date(today);
        if target != today {
            info!("📅 {} is a weekend, targeting {}", today, target);
        }

        if let Some(price) = table.get(target) {
            info!("📅 Data for {} already present", target);
            return Ok(SyncReport {
                date: target,
                price,
                status: TradingStatus::Cached,
            });
        }

        let price = self
            .source
            .opening_price(target)
            .await
            .map_err(UpdateError::Source)?
            .ok_or_else(|| UpdateError::NoData {
                symbol: symbol.to_string(),
                date: target,
            })?;

        if let Some(previous) = table.upsert(Record::new(target, price)) {
            warn!("Replaced existing {} row ({}) with fresh price", target, previous);
        }
        let stored_price = table.get(target).unwrap_or(price);

        self.store.write(&table).await.map_err(UpdateError::Persist)?;
        info!("💾 Table saved: {} rows", table.len());

        self.notify(&table).await;

        Ok(SyncReport {
            date: target,
            price: stored_price,
            status: TradingStatus::Fetched,
        })
    }

    async fn load(&self) -> Result<Table, UpdateError> {
        match self.store.read().await.map_err(UpdateError::Load)? {
            Some(table) => {
                info!("📥 Existing table loaded: {} rows", table.len());
                Ok(table)
            }
            None => {
                info!("📄 No existing table, starting a new one");
                Ok(Table::new())
            }
        }
    }

    async fn notify(&self, table: &Table) {
        if self.sinks.is_empty() {
            debug!("No notification sink configured");
            return;
        }

        let summary = table.summary(Utc::now());
        for sink in &self.sinks {
            if let Err(e) = sink.notify(&summary).await {
                warn!("⚠️ Notification via {} failed: {:#}", sink.name(), e);
            }
        }
    }
}
