//! In-memory quote cache shared by the pipelines
//!
//! Provides a `QuoteCache` holding exactly one entry per source. Entries are
//! fresh for the cache TTL and remain readable as stale data afterwards.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::data::{Quote, SourceId, DEGRADED_MESSAGE};

/// Time a cached quote is served without refetching
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// A stored quote and the time it was stored
///
/// Both halves are written together, so an entry is never half populated.
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Quote,
    fetched_at: DateTime<Utc>,
}

/// Result of reading from cache, including metadata about cache freshness
#[derive(Debug, Clone)]
pub struct CachedData {
    /// The cached quote
    pub data: Quote,
    /// When the quote was stored
    pub fetched_at: DateTime<Utc>,
    /// Whether the entry is older than the TTL
    pub is_expired: bool,
}

/// Holds the latest successful quote of each source
///
/// Readers get clones of the stored quote, so concurrent callers always see
/// a complete snapshot. Writes replace the whole slot; the last writer wins.
#[derive(Debug)]
pub struct QuoteCache {
    entries: RwLock<HashMap<SourceId, CacheEntry>>,
    ttl: Duration,
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl QuoteCache {
    /// Creates an empty cache with the given TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Reads the entry for a source with its freshness
    ///
    /// Returns `None` if nothing was ever stored for the source. Expired
    /// entries are returned with `is_expired = true`.
    pub fn read(&self, source: SourceId) -> Option<CachedData> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(&source)?;
        let age = (Utc::now() - entry.fetched_at).to_std().unwrap_or(Duration::ZERO);

        Some(CachedData {
            data: entry.data.clone(),
            fetched_at: entry.fetched_at,
            is_expired: age >= self.ttl,
        })
    }

    /// Returns the cached quote only while it is fresh
    pub fn get(&self, source: SourceId) -> Option<Quote> {
        self.read(source)
            .filter(|cached| !cached.is_expired)
            .map(|cached| cached.data)
    }

    /// Stores a quote, replacing whatever the source's slot held
    pub fn put(&self, source: SourceId, quote: Quote) {
        let entry = CacheEntry {
            data: quote,
            fetched_at: Utc::now(),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source, entry);
    }

    /// Returns the cached quote regardless of age, marked as degraded
    pub fn get_stale(&self, source: SourceId) -> Option<Quote> {
        self.read(source).map(|cached| Quote {
            degraded: Some(DEGRADED_MESSAGE.to_string()),
            ..cached.data
        })
    }
}
