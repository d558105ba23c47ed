//! Yahoo client and webhook against a local mock HTTP server

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::fakes::MemoryStore;
use crate::common::logging::init_test_logging;
use crate::common::test_data::{date, price, table};
use sp500_updater::api::{PriceSource, SourceError, YahooClient};
use sp500_updater::models::{Config, TradingStatus};
use sp500_updater::notify::{NotificationSink, WebhookNotifier};
use sp500_updater::Updater;

const CHART_PATH: &str = "/v8/finance/chart/%5EGSPC";

fn config_for(server: &MockServer) -> Config {
    Config {
        yahoo_base_url: server.uri(),
        ..Config::default()
    }
}

fn chart_body(timestamps: &[i64], opens: &[Option<f64>]) -> serde_json::Value {
    json!({
        "chart": {
            "result": [{
                "meta": { "symbol": "^GSPC", "exchangeTimezoneName": "America/New_York" },
                "timestamp": timestamps,
                "indicators": { "quote": [{ "open": opens }] }
            }],
            "error": null
        }
    })
}

#[tokio::test]
async fn test_yahoo_client_reads_open_for_date() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CHART_PATH))
        .and(query_param("period1", "1721620800"))
        .and(query_param("period2", "1721707200"))
        .and(query_param("interval", "1d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(&[1721655000], &[Some(5555.740234375)])))
        .expect(1)
        .mount(&server)
        .await;

    let client = YahooClient::new(&config_for(&server)).unwrap();
    let open = client.opening_price(date("2024-07-22")).await.unwrap().unwrap();
    assert_eq!(open.round_dp(2), price("5555.74"));
}

#[tokio::test]
async fn test_yahoo_client_holiday_is_no_data() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CHART_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": { "result": [{ "meta": {}, "indicators": { "quote": [{}] } }], "error": null }
        })))
        .mount(&server)
        .await;

    let client = YahooClient::new(&config_for(&server)).unwrap();
    assert_eq!(client.opening_price(date("2024-07-04")).await.unwrap(), None);
}

#[tokio::test]
async fn test_yahoo_client_http_error_keeps_description() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CHART_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "chart": { "result": null, "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" } }
        })))
        .mount(&server)
        .await;

    let client = YahooClient::new(&config_for(&server)).unwrap();
    let err = client.opening_price(date("2024-07-22")).await.unwrap_err();
    assert_matches!(err, SourceError::Status { status: 404, ref message } if message.contains("delisted"));
}

#[tokio::test]
async fn test_yahoo_client_times_out() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chart_body(&[1721655000], &[Some(5555.74)]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = Config {
        request_timeout_secs: 1,
        ..config_for(&server)
    };
    let client = YahooClient::new(&config).unwrap();
    let err = client.opening_price(date("2024-07-22")).await.unwrap_err();
    assert_matches!(err, SourceError::Http(ref e) if e.is_timeout());
}

#[tokio::test]
async fn test_webhook_posts_summary() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/sp500"))
        .and(body_partial_json(json!({
            "record_count": 2,
            "latest_date": "2024-07-22",
            "latest_price": 5555.74
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryStore::with_table(table(&[("2024-07-19", "5543.34")]));
    let source = crate::common::fakes::FakePriceSource::new().with_price(date("2024-07-22"), price("5555.74"));
    let webhook = WebhookNotifier::new(format!("{}/hooks/sp500", server.uri()), Duration::from_secs(5)).unwrap();

    let report = Updater::new(Box::new(source), Box::new(store), chrono_tz::America::New_York)
        .with_sink(Box::new(webhook))
        .run_for(date("2024-07-22"))
        .await
        .unwrap();
    assert_eq!(report.status, TradingStatus::Fetched);
}

#[tokio::test]
async fn test_webhook_error_status_is_an_error() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let webhook = WebhookNotifier::new(server.uri(), Duration::from_secs(5)).unwrap();
    let summary = table(&[("2024-07-22", "5555.74")]).summary(chrono::Utc::now());
    assert!(webhook.notify(&summary).await.is_err());
}
