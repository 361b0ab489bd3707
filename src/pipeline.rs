//! Source pipelines
//!
//! A pipeline wraps one `QuoteSource` with the shared cache: fresh cached
//! quotes are served as is, misses go to the source, successes are stored
//! and announced, and failures fall back to the last stored quote when
//! there is one.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::cache::QuoteCache;
use crate::data::{Quote, SourceId, UpstreamError};
use crate::notify::Notifier;

/// One upstream site producing quotes
///
/// `fetch` performs all network work and returns the raw body; `parse`
/// turns that body into a quote, normalizing prices along the way.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Which source this is
    fn id(&self) -> SourceId;

    /// Retrieves the raw body holding the prices
    async fn fetch(&self) -> Result<String, UpstreamError>;

    /// Extracts a complete quote from a fetched body
    fn parse(&self, body: &str) -> Result<Quote, UpstreamError>;
}

/// Cache-fronted fetch sequence for one source
///
/// Overlapping misses are not deduplicated: concurrent callers may each
/// fetch, and the last one to finish owns the cache slot.
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn QuoteSource>,
    cache: Arc<QuoteCache>,
    notifier: Notifier,
}

impl Pipeline {
    /// Creates a pipeline for a source using the given cache and notifier
    pub fn new(
        source: Arc<dyn QuoteSource>,
        cache: Arc<QuoteCache>,
        notifier: Notifier,
    ) -> Self {
        Self {
            source,
            cache,
            notifier,
        }
    }

    /// Which source this pipeline serves
    pub fn id(&self) -> SourceId {
        self.source.id()
    }

    /// Returns the current quote
    ///
    /// # Behavior
    /// - Returns the cached quote while it is fresh
    /// - Otherwise fetches and parses the source, caching the result
    /// - On failure, returns the last cached quote marked as degraded
    /// - Fails only when the source fails and nothing was ever cached
    pub async fn get_quote(&self) -> Result<Quote, UpstreamError> {
        let id = self.id();

        if let Some(quote) = self.cache.get(id) {
            debug!(source = %id, "returning cached quote");
            return Ok(quote);
        }

        match self.refresh().await {
            Ok(quote) => Ok(quote),
            Err(e) => {
                if let Some(stale) = self.cache.get_stale(id) {
                    warn!(
                        source = %id,
                        error = %e,
                        "upstream failed, returning stale cached quote"
                    );
                    return Ok(stale);
                }
                error!(source = %id, error = %e, "upstream failed with nothing cached");
                Err(e)
            }
        }
    }

    /// Fetches a fresh quote, stores it and sends the notification
    async fn refresh(&self) -> Result<Quote, UpstreamError> {
        let id = self.id();
        info!(source = %id, host = id.host(), "fetching quote");

        let body = self.source.fetch().await?;
        let quote = self.source.parse(&body)?;

        self.cache.put(id, quote.clone());
        info!(source = %id, buy = %quote.buy_price, sell = %quote.sell_price, "fetched quote");

        self.notifier.notify(id, &quote);
        Ok(quote)
    }
}

/// Owns the gold and silver pipelines behind a single entry point
#[derive(Clone)]
pub struct QuoteService {
    gold: Pipeline,
    silver: Pipeline,
}

impl QuoteService {
    /// Creates a service from one pipeline per source
    pub fn new(gold: Pipeline, silver: Pipeline) -> Self {
        Self { gold, silver }
    }

    /// Builds both pipelines around a shared cache and notifier
    pub fn from_sources(
        gold: Arc<dyn QuoteSource>,
        silver: Arc<dyn QuoteSource>,
        cache: Arc<QuoteCache>,
        notifier: Notifier,
    ) -> Self {
        Self::new(
            Pipeline::new(gold, Arc::clone(&cache), notifier.clone()),
            Pipeline::new(silver, cache, notifier),
        )
    }

    /// Returns the pipeline serving a source
    pub fn pipeline(&self, source: SourceId) -> &Pipeline {
        match source {
            SourceId::Gold => &self.gold,
            SourceId::Silver => &self.silver,
        }
    }

    /// Returns the current quote of a source
    pub async fn get_quote(&self, source: SourceId) -> Result<Quote, UpstreamError> {
        self.pipeline(source).get_quote().await
    }
}
