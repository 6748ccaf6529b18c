//! Short-lived memo of resolved rates.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::rate::{RateQuery, RateRecord};

/// Cached rate entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    rate: RateRecord,
    cached_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn new(rate: RateRecord, ttl: Duration) -> Self {
        Self {
            rate,
            cached_at: Utc::now(),
            ttl,
        }
    }

    fn is_valid(&self) -> bool {
        Utc::now().signed_duration_since(self.cached_at) < self.ttl
    }
}

/// Configuration for [`ResolvedRateCache`].
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Lifetime of an entry.
    pub ttl: Duration,
    /// Maximum number of entries.
    pub max_entries: usize,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(60),
            max_entries: 10_000,
        }
    }
}

impl RateCacheConfig {
    pub fn from_std(ttl: std::time::Duration, max_entries: usize) -> Self {
        Self {
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(1)),
            max_entries,
        }
    }
}

/// Thread-safe cache of resolved records, keyed by the full query.
///
/// Reloads are not tracked: a stale entry lives at most one TTL.
pub struct ResolvedRateCache {
    entries: DashMap<RateQuery, CacheEntry>,
    config: RateCacheConfig,
}

impl ResolvedRateCache {
    pub fn new() -> Self {
        Self::with_config(RateCacheConfig::default())
    }

    pub fn with_config(config: RateCacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Cached record for `query`, if still valid.
    pub fn get(&self, query: &RateQuery) -> Option<RateRecord> {
        if let Some(entry) = self.entries.get(query) {
            if entry.is_valid() {
                debug!(query = %query, "Rate cache hit");
                return Some(entry.rate.clone());
            }
            drop(entry);
            debug!(query = %query, "Rate cache entry expired");
            self.entries.remove(query);
        }
        None
    }

    pub fn insert(&self, query: RateQuery, rate: RateRecord) {
        if self.entries.len() >= self.config.max_entries {
            self.evict_expired();
            if self.entries.len() >= self.config.max_entries {
                debug!(entries = self.entries.len(), "Rate cache full, clearing");
                self.entries.clear();
            }
        }
        self.entries.insert(query, CacheEntry::new(rate, self.config.ttl));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn evict_expired(&self) {
        self.entries.retain(|_, entry| entry.is_valid());
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.entries.len();
        let valid = self.entries.iter().filter(|e| e.is_valid()).count();

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
        }
    }
}

impl Default for ResolvedRateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RateBuilder;
    use crate::rate::{RateContext, RateKind};
    use pivotfx_common::Currency;
    use rust_decimal_macros::dec;
    use std::thread::sleep;
    use std::time::Duration as StdDuration;

    fn make_rate() -> RateRecord {
        RateBuilder::new(RateContext::new("TEST", RateKind::Historic))
            .base(Currency::usd())
            .term(Currency::eur())
            .factor(dec!(0.91))
            .build()
            .unwrap()
    }

    #[test]
    fn test_cache_insert_and_get() {
        let cache = ResolvedRateCache::new();
        let query = RateQuery::new(Currency::usd(), Currency::eur());

        cache.insert(query.clone(), make_rate());

        assert_eq!(cache.get(&query).unwrap().factor(), dec!(0.91));
        // filters and dates are part of the key
        assert!(cache.get(&query.clone().with_provider("ECB")).is_none());
        assert!(cache.get(&query.reversed()).is_none());
    }

    #[test]
    fn test_cache_expiry() {
        let cache = ResolvedRateCache::with_config(RateCacheConfig {
            ttl: Duration::milliseconds(50),
            ..Default::default()
        });
        let query = RateQuery::new(Currency::usd(), Currency::eur());
        cache.insert(query.clone(), make_rate());
        assert!(cache.get(&query).is_some());

        sleep(StdDuration::from_millis(60));

        assert!(cache.get(&query).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_bound() {
        let cache = ResolvedRateCache::with_config(RateCacheConfig {
            max_entries: 2,
            ..Default::default()
        });
        for code in ["EUR", "GBP", "JPY"] {
            cache.insert(RateQuery::new(Currency::usd(), Currency::new(code)), make_rate());
        }
        assert!(cache.len() <= 2);
        assert_eq!(cache.stats().expired_entries, 0);
    }
}
