use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of decimal places kept for stored prices
pub const PRICE_DECIMALS: u32 = 2;

/// Round a price to the stored precision
pub fn round_price(price: Decimal) -> Decimal {
    let mut rounded = price.round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(PRICE_DECIMALS);
    rounded
}

/// One daily opening price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub date: NaiveDate,
    pub opening_price: Decimal,
}

impl Record {
    pub fn new(date: NaiveDate, opening_price: Decimal) -> Self {
        Self { date, opening_price }
    }
}

/// Full set of records for one symbol, unique by date and sorted ascending
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    rows: BTreeMap<NaiveDate, Decimal>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rows in file order. Later rows replace earlier
    /// rows for the same date. Prices are rounded to the stored precision.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        Self::from_records_counting(records).0
    }

    /// Same as `from_records`, also returning how many rows were dropped as
    /// duplicates.
    pub fn from_records_counting<I>(records: I) -> (Self, usize)
    where
        I: IntoIterator<Item = Record>,
    {
        let mut rows = BTreeMap::new();
        let mut duplicates = 0;
        for record in records {
            if rows.insert(record.date, round_price(record.opening_price)).is_some() {
                duplicates += 1;
            }
        }
        (Self { rows }, duplicates)
    }

    pub fn get(&self, date: NaiveDate) -> Option<Decimal> {
        self.rows.get(&date).copied()
    }

    /// Insert or replace the record for `record.date`, rounding the price.
    /// Returns the previous price for that date, if any.
    pub fn upsert(&mut self, record: Record) -> Option<Decimal> {
        self.rows.insert(record.date, round_price(record.opening_price))
    }

    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.rows
            .iter()
            .map(|(date, price)| Record::new(*date, *price))
    }

    pub fn latest(&self) -> Option<Record> {
        self.rows
            .iter()
            .next_back()
            .map(|(date, price)| Record::new(*date, *price))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn summary(&self, last_updated: DateTime<Utc>) -> TableSummary {
        let latest = self.latest();
        TableSummary {
            last_updated,
            record_count: self.len(),
            latest_date: latest.map(|r| r.date),
            latest_price: latest.map(|r| r.opening_price),
        }
    }
}

/// How the reported price was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingStatus {
    /// Fetched from the price source and written to the store
    Fetched,
    /// Already present in the store, nothing fetched or written
    Cached,
}

impl fmt::Display for TradingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingStatus::Fetched => write!(f, "fetched"),
            TradingStatus::Cached => write!(f, "cached"),
        }
    }
}

/// Result of a successful sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub date: NaiveDate,
    pub price: Decimal,
    pub status: TradingStatus,
}

/// Summary published to notification sinks after a write
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub last_updated: DateTime<Utc>,
    pub record_count: usize,
    pub latest_date: Option<NaiveDate>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub latest_price: Option<Decimal>,
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub csv_path: String,
    pub symbol: String,
    pub yahoo_base_url: String,
    pub request_timeout_secs: u64,
    pub market_timezone: Tz,
    pub webhook_url: Option<String>,
    pub webhook_timeout_secs: u64,
    pub summary_path: Option<String>,
}

pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 30;

impl Default for Config {
    fn default() -> Self {
        Config {
            csv_path: "sp500_data.csv".to_string(),
            symbol: "^GSPC".to_string(),
            yahoo_base_url: "https://query1.finance.yahoo.com".to_string(),
            request_timeout_secs: MAX_REQUEST_TIMEOUT_SECS,
            market_timezone: chrono_tz::America::New_York,
            webhook_url: None,
            webhook_timeout_secs: 10,
            summary_path: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let market_timezone = match non_empty("MARKET_TIMEZONE") {
            Some(name) => name
                .trim()
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("MARKET_TIMEZONE '{}' is not a valid timezone: {}", name, e))?,
            None => defaults.market_timezone,
        };

        let mut request_timeout_secs = non_empty("REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.request_timeout_secs);
        if request_timeout_secs == 0 || request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            tracing::warn!(
                "REQUEST_TIMEOUT_SECS={} out of range, using {}s",
                request_timeout_secs,
                MAX_REQUEST_TIMEOUT_SECS
            );
            request_timeout_secs = MAX_REQUEST_TIMEOUT_SECS;
        }

        Ok(Config {
            csv_path: non_empty("CSV_PATH").unwrap_or(defaults.csv_path),
            symbol: non_empty("SYMBOL").unwrap_or(defaults.symbol),
            yahoo_base_url: non_empty("YAHOO_BASE_URL").unwrap_or(defaults.yahoo_base_url),
            request_timeout_secs,
            market_timezone,
            webhook_url: non_empty("WEBHOOK_URL"),
            webhook_timeout_secs: non_empty("WEBHOOK_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.webhook_timeout_secs),
            summary_path: non_empty("SUMMARY_PATH"),
        })
    }
}
