//! Cache module for holding the latest quote of each source
//!
//! This module provides an in-memory, single-slot-per-source cache with a
//! fixed TTL. It supports graceful degradation by keeping expired entries
//! around, so a pipeline can fall back to stale data when its upstream is
//! unavailable.

mod manager;

pub use manager::{CachedData, QuoteCache, DEFAULT_TTL};
