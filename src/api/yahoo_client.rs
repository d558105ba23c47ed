use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{PriceSource, SourceError};
use crate::models::Config;

/// Chart API response envelope
#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBars>,
}

#[derive(Debug, Deserialize)]
struct QuoteBars {
    #[serde(default)]
    open: Vec<Option<f64>>,
}

/// Yahoo Finance chart API client
pub struct YahooClient {
    client: Client,
    base_url: String,
    symbol: String,
    timezone: Tz,
}

impl YahooClient {
    /// Create a new Yahoo client
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) sp500-updater/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: config.yahoo_base_url.trim_end_matches('/').to_string(),
            symbol: config.symbol.clone(),
            timezone: config.market_timezone,
        })
    }

    /// Start of `date` on the exchange clock. Midnight, or the first valid
    /// local time after it when a DST change skips midnight.
    fn exchange_midnight(&self, date: NaiveDate) -> Result<DateTime<Tz>, SourceError> {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| SourceError::Unexpected(format!("invalid date {}", date)))?;
        (0..24 * 60)
            .map(|minutes| midnight + Duration::minutes(minutes))
            .find_map(|local| self.timezone.from_local_datetime(&local).earliest())
            .ok_or_else(|| SourceError::Unexpected(format!("no local start of day for {} in {}", date, self.timezone)))
    }

    fn chart_url(&self, date: NaiveDate) -> Result<Url, SourceError> {
        let start = self.exchange_midnight(date)?;
        let end = self.exchange_midnight(date + Duration::days(1))?;

        // '^' is legal in a URL path, Yahoo expects it percent-encoded
        let symbol: String = url::form_urlencoded::byte_serialize(self.symbol.as_bytes()).collect();
        let mut url = Url::parse(&format!("{}/v8/finance/chart/{}", self.base_url, symbol))
            .map_err(|e| SourceError::Unexpected(format!("invalid base url {}: {}", self.base_url, e)))?;
        url.query_pairs_mut()
            .append_pair("period1", &start.timestamp().to_string())
            .append_pair("period2", &end.timestamp().to_string())
            .append_pair("interval", "1d");
        Ok(url)
    }

    /// Pick the opening price of the bar that falls on `date`
    fn open_for_date(&self, body: &str, date: NaiveDate) -> Result<Option<Decimal>, SourceError> {
        let envelope: ChartEnvelope = serde_json::from_str(body).map_err(|e| {
            SourceError::Unexpected(format!(
                "failed to parse chart data: {} | Response: {}",
                e,
                body.chars().take(200).collect::<String>()
            ))
        })?;

        if let Some(error) = envelope.chart.error {
            return Err(SourceError::Provider {
                code: error.code,
                description: error.description,
            });
        }

        let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
            return Ok(None);
        };
        let opens = result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.open)
            .unwrap_or_default();

        for (timestamp, open) in result.timestamp.iter().zip(opens) {
            let Some(bar_time) = Utc.timestamp_opt(*timestamp, 0).single() else {
                continue;
            };
            if bar_time.with_timezone(&self.timezone).date_naive() != date {
                continue;
            }
            let Some(open) = open else {
                debug!("Bar for {} has no open price", date);
                return Ok(None);
            };
            if !open.is_finite() || open < 0.0 {
                return Err(SourceError::Unexpected(format!("invalid open price {} for {}", open, date)));
            }
            // exact binary value, so rounding sees 5555.745 as 5555.74499..
            return Decimal::from_f64_retain(open)
                .map(Some)
                .ok_or_else(|| SourceError::Unexpected(format!("open price {} is not representable", open)));
        }

        Ok(None)
    }
}

#[async_trait::async_trait]
impl PriceSource for YahooClient {
    async fn opening_price(&self, date: NaiveDate) -> Result<Option<Decimal>, SourceError> {
        let url = self.chart_url(date)?;
        debug!("Making request to: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ChartEnvelope>(&body)
                .ok()
                .and_then(|e| e.chart.error)
                .map(|e| e.description)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(SourceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let open = self.open_for_date(&body, date)?;
        match open {
            Some(price) => info!("💰 {} opened at {} on {}", self.symbol, price, date),
            None => info!("⚠️ No data for {} on {}", self.symbol, date),
        }
        Ok(open)
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}
