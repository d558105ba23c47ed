use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

pub mod yahoo_client;
pub use yahoo_client::YahooClient;

/// Failures talking to a price source. "No data for this date" is not an
/// error; sources report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("provider error {code}: {description}")]
    Provider { code: String, description: String },

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Source of daily opening prices for one symbol
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    /// Opening price on `date`, or `None` when the market has no data for it
    async fn opening_price(&self, date: NaiveDate) -> Result<Option<Decimal>, SourceError>;

    /// Symbol this source is quoting
    fn symbol(&self) -> &str;
}
