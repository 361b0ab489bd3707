//! Core data models for the quote service
//!
//! This module contains the types shared by every source pipeline: the
//! `Quote` returned to callers, the `Price` values inside it, the `SourceId`
//! naming each upstream site, and the `UpstreamError` every fetch or parse
//! failure collapses into.

pub mod gold;
pub mod normalize;
pub mod silver;

pub use gold::GoldClient;
pub use silver::SilverClient;

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Browser-like User-Agent sent to every upstream
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Message attached to a quote served from stale cache
pub const DEGRADED_MESSAGE: &str = "Using cached data due to upstream failure";

/// Identifies one upstream site and its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    /// mihong.vn, gold 999 via the pricing API
    Gold,
    /// giabac.vn, silver via the landing page markup
    Silver,
}

impl SourceId {
    /// Host name reported in quotes and error envelopes
    pub fn host(self) -> &'static str {
        match self {
            SourceId::Gold => "mihong.vn",
            SourceId::Silver => "giabac.vn",
        }
    }

    /// Short lowercase name used in logs and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            SourceId::Gold => "gold",
            SourceId::Silver => "silver",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single price value
///
/// Numeric when normalization succeeded, otherwise the text exactly as it
/// was presented upstream (for example a locale-grouped gold price).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Number(i64),
    Text(String),
}

impl Price {
    /// Builds a price from scraped text: numeric when it normalizes,
    /// raw text otherwise, `None` when the text is blank
    pub fn from_scraped(text: &str) -> Option<Price> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(match normalize::normalize_price(text) {
            Some(value) => Price::Number(value),
            None => Price::Text(text.to_string()),
        })
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Number(value) => write!(f, "{}", value),
            Price::Text(text) => f.write_str(text),
        }
    }
}

/// The buy/sell quote produced by one extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Host of the origin site
    pub source: String,
    /// Price the dealer buys at
    #[serde(rename = "Giá mua")]
    pub buy_price: Price,
    /// Price the dealer sells at
    #[serde(rename = "Giá bán")]
    pub sell_price: Price,
    /// Update time text shown by the source page, if any
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Set only when this quote is stale data served after an upstream failure
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl Quote {
    /// Creates a fresh quote for the given source
    pub fn new(source: SourceId, buy_price: Price, sell_price: Price) -> Self {
        Self {
            source: source.host().to_string(),
            buy_price,
            sell_price,
            updated_at: None,
            degraded: None,
        }
    }

    /// Returns whether this quote was served from stale cache
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Broad classification of an upstream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection failure or timeout
    Network,
    /// Response did not have the expected shape
    UpstreamFormat,
    /// Well-formed response without the needed record or price
    ExtractionNotFound,
}

/// Any failure while fetching or parsing an upstream source
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Network(reqwest::Error),

    /// Request exceeded its deadline
    #[error("Request timed out: {0}")]
    Timeout(reqwest::Error),

    /// Upstream answered with a non-2xx status
    #[error("Upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Payload did not have the expected shape
    #[error("{0}")]
    Format(String),

    /// Payload was well-formed but the needed data was absent
    #[error("{0}")]
    NotFound(String),
}

impl UpstreamError {
    /// Classifies this error into one of the broad failure kinds
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpstreamError::Network(_)
            | UpstreamError::Timeout(_)
            | UpstreamError::Status { .. } => ErrorKind::Network,
            UpstreamError::Format(_) => ErrorKind::UpstreamFormat,
            UpstreamError::NotFound(_) => ErrorKind::ExtractionNotFound,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(err)
        } else {
            UpstreamError::Network(err)
        }
    }
}

/// Fails with `UpstreamError::Status` unless the response is 2xx
pub(crate) fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(UpstreamError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}
