//! Silver quote scraper for giabac.vn
//!
//! The landing page shows the current quote as a label paragraph followed by
//! a value paragraph. Those values are sometimes filled in by script after
//! load, so when either one is missing from the fetched markup the price
//! tables further down the page are scanned instead.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::normalize::normalize_price;
use super::{check_status, Price, Quote, SourceId, UpstreamError, USER_AGENT};
use crate::pipeline::QuoteSource;

/// Landing page carrying the silver quote
pub const SILVER_PAGE_URL: &str = "https://giabac.vn/";

/// Label preceding the buying price
const BUY_LABEL: &str = "Giá mua vào";

/// Label preceding the selling price
const SELL_LABEL: &str = "Giá bán ra";

/// Lowercase keyword of the buy column header
const BUY_KEYWORD: &str = "mua";

/// Lowercase keyword of the sell column header
const SELL_KEYWORD: &str = "bán";

/// Lowercase keyword a silver price row must contain
const SILVER_KEYWORD: &str = "bạc";

/// Lowercase phrase marking brand comparison rows
const BRAND_PHRASE: &str = "thương hiệu";

/// Candidates for the element holding the page's update time, in order
const UPDATED_AT_SELECTORS: [&str; 6] = [
    ".updated",
    ".time",
    r#"[class*="time"]"#,
    r#"[class*="update"]"#,
    r#"[id*="time"]"#,
    r#"[id*="update"]"#,
];

/// Client for scraping the silver quote from giabac.vn
#[derive(Debug, Clone)]
pub struct SilverClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Page to scrape
    page_url: String,
}

impl SilverClient {
    /// Creates a new SilverClient against the live site
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_url(timeout, SILVER_PAGE_URL)
    }

    /// Creates a new SilverClient with a custom page URL
    pub fn with_url(
        timeout: Duration,
        page_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http_client,
            page_url: page_url.into(),
        })
    }
}

#[async_trait]
impl QuoteSource for SilverClient {
    fn id(&self) -> SourceId {
        SourceId::Silver
    }

    async fn fetch(&self) -> Result<String, UpstreamError> {
        let response = self.http_client.get(&self.page_url).send().await?;
        Ok(check_status(response)?.text().await?)
    }

    fn parse(&self, body: &str) -> Result<Quote, UpstreamError> {
        parse_page(body)
    }
}

/// Selectors used while walking the page
struct Selectors {
    label: Selector,
    table: Selector,
    row: Selector,
    cell: Selector,
}

impl Selectors {
    fn new() -> Result<Self, UpstreamError> {
        let parse = |css: &str| {
            Selector::parse(css)
                .map_err(|e| UpstreamError::Format(format!("Invalid selector {}: {:?}", css, e)))
        };

        Ok(Self {
            label: parse("p.mb-1")?,
            table: parse("table")?,
            row: parse("tr")?,
            cell: parse("th, td")?,
        })
    }
}

/// Extracts the silver quote from the landing page markup
fn parse_page(body: &str) -> Result<Quote, UpstreamError> {
    let selectors = Selectors::new()?;
    let document = Html::parse_document(body);

    let mut buy = labelled_price(&document, &selectors, BUY_LABEL);
    let mut sell = labelled_price(&document, &selectors, SELL_LABEL);

    if buy.is_none() || sell.is_none() {
        debug!(
            buy_found = buy.is_some(),
            sell_found = sell.is_some(),
            "silver labels incomplete, scanning price tables"
        );
        fill_from_tables(&document, &selectors, &mut buy, &mut sell);
    }

    let (Some(buy), Some(sell)) = (buy, sell) else {
        return Err(UpstreamError::NotFound(
            "Could not extract buy/sell prices".to_string(),
        ));
    };

    let mut quote = Quote::new(SourceId::Silver, buy, sell);
    quote.updated_at = updated_at(&document);
    Ok(quote)
}

/// Reads the price in the paragraph right after the first label with a value
///
/// Labels whose following paragraph is missing or blank are skipped. The
/// first non-blank value ends the scan even if it does not normalize, in
/// which case the price is reported missing.
fn labelled_price(document: &Html, selectors: &Selectors, label: &str) -> Option<Price> {
    let text = document
        .select(&selectors.label)
        .filter(|element| element_text(element).contains(label))
        .filter_map(|element| element.next_siblings().find_map(ElementRef::wrap))
        .filter(|sibling| sibling.value().name() == "p")
        .map(|sibling| element_text(&sibling))
        .find(|text| !text.is_empty())?;

    normalize_price(&text).map(Price::Number)
}

/// Fills whichever price is still missing from the first matching table row
///
/// A table qualifies when its first row has both a buy and a sell column
/// header. Its first later row mentioning silver, and not a brand
/// comparison row, supplies the values.
fn fill_from_tables(
    document: &Html,
    selectors: &Selectors,
    buy: &mut Option<Price>,
    sell: &mut Option<Price>,
) {
    for table in document.select(&selectors.table) {
        let mut rows = table.select(&selectors.row);
        let Some(header) = rows.next() else {
            continue;
        };

        let mut buy_index = None;
        let mut sell_index = None;
        for (i, cell) in header.select(&selectors.cell).enumerate() {
            let text = element_text(&cell).to_lowercase();
            if text.contains(BUY_KEYWORD) {
                buy_index = Some(i);
            }
            if text.contains(SELL_KEYWORD) {
                sell_index = Some(i);
            }
        }

        if let (Some(buy_index), Some(sell_index)) = (buy_index, sell_index) {
            for row in rows {
                let text = element_text(&row).to_lowercase();
                if !text.contains(SILVER_KEYWORD) || text.contains(BRAND_PHRASE) {
                    continue;
                }

                let cells: Vec<ElementRef<'_>> = row.select(&selectors.cell).collect();
                if cells.len() <= buy_index.max(sell_index) {
                    continue;
                }

                if buy.is_none() {
                    *buy = Price::from_scraped(&element_text(&cells[buy_index]));
                }
                if sell.is_none() {
                    *sell = Price::from_scraped(&element_text(&cells[sell_index]));
                }
                break;
            }
        }

        if buy.is_some() && sell.is_some() {
            break;
        }
    }
}

/// Finds the page's "last updated" text, if it shows one
fn updated_at(document: &Html) -> Option<String> {
    UPDATED_AT_SELECTORS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        let element = document.select(&selector).next()?;
        let text = element_text(&element);
        (!text.is_empty()).then_some(text)
    })
}

/// Concatenated, trimmed text content of an element
fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
