//! Integration tests for the source clients against fake upstreams
//!
//! Each test starts a wiremock server standing in for the real site and
//! drives a client through the public `QuoteSource` and pipeline APIs.

use std::sync::Arc;
use std::time::Duration;

use metalquote::cache::QuoteCache;
use metalquote::data::{ErrorKind, GoldClient, Price, SilverClient, SourceId, UpstreamError};
use metalquote::notify::Notifier;
use metalquote::pipeline::{Pipeline, QuoteSource};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(10);

fn gold_client(server: &MockServer) -> GoldClient {
    GoldClient::with_urls(
        TIMEOUT,
        format!("{}/vi/gia-vang-trong-nuoc", server.uri()),
        format!("{}/api/v1/gold/prices/current", server.uri()),
    )
    .expect("client should build")
}

fn gold_payload() -> serde_json::Value {
    json!({
        "success": true,
        "data": [
            { "code": "SJC", "buyingPrice": 8_300_000, "sellingPrice": 8_500_000 },
            { "code": "999", "buyingPrice": 7_850_000, "sellingPrice": 8_000_000 }
        ]
    })
}

async fn fetch_quote(
    source: &dyn QuoteSource,
) -> Result<metalquote::data::Quote, UpstreamError> {
    let body = source.fetch().await?;
    source.parse(&body)
}

/// Waits until the background notification task has posted to the server
async fn wait_for_notification(server: &MockServer) {
    for _ in 0..100 {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.iter().any(|r| r.method.as_str() == "POST") {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("notification was never posted");
}

async fn mount_silver_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div><p class="mb-1">Giá mua vào</p><p>1.250.000</p></div>
               <div><p class="mb-1">Giá bán ra</p><p>1.290.000</p></div>"#,
        ))
        .mount(server)
        .await;
}

fn notifying_pipeline(server: &MockServer) -> Pipeline {
    let client = SilverClient::with_url(TIMEOUT, format!("{}/", server.uri())).unwrap();
    Pipeline::new(
        Arc::new(client),
        Arc::new(QuoteCache::default()),
        Notifier::new(format!("{}/topic", server.uri())).expect("notifier should build"),
    )
}

#[tokio::test]
async fn test_gold_replays_session_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vi/gia-vang-trong-nuoc"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "XSRF-TOKEN=abc123; path=/; samesite=lax")
                .append_header("set-cookie", "mihong_session=xyz; path=/; httponly")
                .set_body_string("<html></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/gold/prices/current"))
        .and(header("cookie", "XSRF-TOKEN=abc123; mihong_session=xyz"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gold_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let quote = fetch_quote(&gold_client(&server)).await.expect("gold quote");

    assert_eq!(quote.source, "mihong.vn");
    assert_eq!(quote.buy_price, Price::Text("7.850.000".to_string()));
    assert_eq!(quote.sell_price, Price::Text("8.000.000".to_string()));
}

#[tokio::test]
async fn test_gold_without_cookies_still_calls_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vi/gia-vang-trong-nuoc"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/gold/prices/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gold_payload()))
        .expect(1)
        .mount(&server)
        .await;

    assert!(fetch_quote(&gold_client(&server)).await.is_ok());
}

#[tokio::test]
async fn test_gold_api_error_status_is_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vi/gia-vang-trong-nuoc"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/gold/prices/current"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = fetch_quote(&gold_client(&server)).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Status { status: 403, .. }));
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn test_gold_api_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vi/gia-vang-trong-nuoc"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/gold/prices/current"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gold_payload())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = GoldClient::with_urls(
        Duration::from_millis(200),
        format!("{}/vi/gia-vang-trong-nuoc", server.uri()),
        format!("{}/api/v1/gold/prices/current", server.uri()),
    )
    .unwrap();
    let err = client.fetch().await.unwrap_err();

    assert!(matches!(err, UpstreamError::Timeout(_)), "unexpected error: {}", err);
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn test_gold_landing_page_error_skips_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vi/gia-vang-trong-nuoc"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/gold/prices/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gold_payload()))
        .expect(0)
        .mount(&server)
        .await;

    let err = fetch_quote(&gold_client(&server)).await.unwrap_err();

    assert!(matches!(err, UpstreamError::Status { status: 503, .. }), "unexpected error: {}", err);
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn test_silver_page_is_scraped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                <div><p class="mb-1">Giá mua vào</p><p>1.250.000</p></div>
                <div><p class="mb-1">Giá bán ra</p><p>1.290.000</p></div>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    let client = SilverClient::with_url(TIMEOUT, format!("{}/", server.uri())).unwrap();
    let quote = fetch_quote(&client).await.expect("silver quote");

    assert_eq!(quote.source, "giabac.vn");
    assert_eq!(quote.buy_price, Price::Number(1_250_000));
    assert_eq!(quote.sell_price, Price::Number(1_290_000));
}

#[tokio::test]
async fn test_silver_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = SilverClient::with_url(Duration::from_millis(200), server.uri()).unwrap();
    let err = client.fetch().await.unwrap_err();

    assert!(matches!(err, UpstreamError::Timeout(_)), "unexpected error: {}", err);
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn test_pipeline_serves_stale_silver_quote_after_upstream_outage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<table>
                <tr><th>Sản phẩm</th><th>Mua vào</th><th>Bán ra</th></tr>
                <tr><td>Bạc miếng 999</td><td>1.250.000</td><td>1.290.000</td></tr>
            </table>"#,
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = SilverClient::with_url(TIMEOUT, server.uri()).unwrap();
    let pipeline = Pipeline::new(
        Arc::new(client),
        Arc::new(QuoteCache::new(Duration::ZERO)),
        Notifier::disabled(),
    );

    let fresh = pipeline.get_quote().await.expect("first fetch succeeds");
    let stale = pipeline.get_quote().await.expect("outage is masked by cache");

    assert_eq!(pipeline.id(), SourceId::Silver);
    assert!(!fresh.is_degraded());
    assert!(stale.is_degraded());
    assert_eq!(stale.buy_price, fresh.buy_price);
}

#[tokio::test]
async fn test_fresh_quote_is_announced() {
    let server = MockServer::start().await;
    mount_silver_page(&server).await;
    Mock::given(method("POST"))
        .and(path("/topic"))
        .and(query_param("Title", "Giá bạc hiện tại"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = notifying_pipeline(&server);
    let quote = pipeline.get_quote().await.expect("silver quote");
    assert!(!quote.is_degraded());

    // Cached quotes are not announced again
    pipeline.get_quote().await.expect("cached silver quote");
    wait_for_notification(&server).await;
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_pipeline() {
    let server = MockServer::start().await;
    mount_silver_page(&server).await;
    Mock::given(method("POST"))
        .and(path("/topic"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let pipeline = notifying_pipeline(&server);
    let quote = pipeline.get_quote().await.expect("notification errors are swallowed");
    assert!(!quote.is_degraded());

    wait_for_notification(&server).await;
}
