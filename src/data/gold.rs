//! Gold quote client for mihong.vn
//!
//! The pricing API only answers requests carrying the session cookies handed
//! out by the public price page, so every fetch first loads that page, keeps
//! the `name=value` part of each `Set-Cookie` header and replays them on the
//! API call together with an XHR marker header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER, SET_COOKIE};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::normalize::format_grouped;
use super::{check_status, Price, Quote, SourceId, UpstreamError, USER_AGENT};
use crate::pipeline::QuoteSource;

/// Public price page handing out the session cookies
pub const GOLD_PAGE_URL: &str = "https://mihong.vn/vi/gia-vang-trong-nuoc";

/// Pricing API returning every tracked product
pub const GOLD_API_URL: &str = "https://mihong.vn/api/v1/gold/prices/current";

/// Product code of 99.9% gold in the API payload
const GOLD_CODE: &str = "999";

/// Client for fetching the gold 999 quote from mihong.vn
#[derive(Debug, Clone)]
pub struct GoldClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Page visited to obtain session cookies
    page_url: String,
    /// Pricing API endpoint
    api_url: String,
}

impl GoldClient {
    /// Creates a new GoldClient against the live site
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_urls(timeout, GOLD_PAGE_URL, GOLD_API_URL)
    }

    /// Creates a new GoldClient with custom page and API URLs
    ///
    /// The upstream serves a certificate chain that fails validation, so
    /// certificate checks are disabled for this client only.
    pub fn with_urls(
        timeout: Duration,
        page_url: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let page_url = page_url.into();

        let mut headers = HeaderMap::new();
        if let Ok(referer) = HeaderValue::from_str(&page_url) {
            headers.insert(REFERER, referer);
        }

        let http_client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            page_url,
            api_url: api_url.into(),
        })
    }
}

#[async_trait]
impl QuoteSource for GoldClient {
    fn id(&self) -> SourceId {
        SourceId::Gold
    }

    async fn fetch(&self) -> Result<String, UpstreamError> {
        let page = check_status(self.http_client.get(&self.page_url).send().await?)?;
        let cookies = cookie_header(page.headers());
        debug!(cookies = cookies.len(), "gold session bootstrapped");

        let response = self
            .http_client
            .get(&self.api_url)
            .header(COOKIE, cookies)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;

        Ok(check_status(response)?.text().await?)
    }

    fn parse(&self, body: &str) -> Result<Quote, UpstreamError> {
        parse_prices(body)
    }
}

/// Builds a `Cookie` header value from the `Set-Cookie` headers of a response
///
/// Only the `name=value` part of each directive is kept. An empty string is
/// returned when the response sets no cookies.
pub fn cookie_header(headers: &HeaderMap) -> String {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|directive| directive.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parses the pricing API payload into a gold quote
fn parse_prices(body: &str) -> Result<Quote, UpstreamError> {
    let invalid = || UpstreamError::Format("Invalid API response format".to_string());

    let payload: Value = serde_json::from_str(body).map_err(|_| invalid())?;
    let success = payload.get("success").map(is_truthy).unwrap_or(false);
    let records = match payload.get("data") {
        Some(Value::Array(records)) if success => records,
        _ => return Err(invalid()),
    };

    let record = records
        .iter()
        .find(|record| record.get("code").and_then(Value::as_str) == Some(GOLD_CODE))
        .ok_or_else(|| UpstreamError::NotFound("Gold 999 price not found".to_string()))?;

    let buy = price_field(record, "buyingPrice")?;
    let sell = price_field(record, "sellingPrice")?;

    Ok(Quote::new(
        SourceId::Gold,
        Price::Text(format_grouped(buy)),
        Price::Text(format_grouped(sell)),
    ))
}

/// Reads a numeric field that may arrive as a number or a numeric string
fn price_field(record: &Value, field: &str) -> Result<f64, UpstreamError> {
    let value = match record.get(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| UpstreamError::Format(format!("Gold 999 record has no numeric {}", field)))
}

/// JSON truthiness for the `success` flag
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
