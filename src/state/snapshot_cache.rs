use crate::market_data::types::StockQuery;
use crate::metrics::prometheus;
use crate::state::market::MarketSnapshot;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Composite key over every request field.
/// Fields are kept as-is, so an empty interval is its own partition.
#[derive(Eq, Hash, PartialEq, Clone, Debug)]
pub struct CacheKey {
    pub symbol: String,
    pub start_date: String,
    pub end_date: String,
    pub interval: String,
}

impl CacheKey {
    pub fn new(symbol: &str, start_date: &str, end_date: &str, interval: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            interval: interval.to_string(),
        }
    }
}

impl From<&StockQuery> for CacheKey {
    fn from(query: &StockQuery) -> Self {
        Self::new(
            &query.symbol,
            &query.start_date,
            &query.end_date,
            &query.interval,
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.symbol, self.start_date, self.end_date, self.interval
        )
    }
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub snapshot: Arc<MarketSnapshot>,
    pub inserted_at: Instant,
}

/// TTL-gated snapshot store shared by every worker.
///
/// Expiry is only checked on read; stale entries stay in the map until the
/// same key is written again, unless `max_entries` is set, in which case a
/// put of a new key into a full cache evicts the oldest entry first.
///
/// Cheap to clone (just an Arc bump).
#[derive(Clone, Debug)]
pub struct SnapshotCache {
    entries: Arc<DashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_entries: Option<usize>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            max_entries: None,
        }
    }

    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = max_entries.map(|n| n.max(1));
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the snapshot only while `now - inserted_at < ttl`.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<MarketSnapshot>> {
        let entry = self.entries.get(key)?;
        if entry.inserted_at.elapsed() < self.ttl {
            Some(Arc::clone(&entry.snapshot))
        } else {
            debug!(%key, "cache entry expired");
            None
        }
    }

    /// Inserts or overwrites unconditionally, stamping the current time.
    pub fn put(&self, key: CacheKey, snapshot: Arc<MarketSnapshot>) {
        if let Some(max) = self.max_entries {
            if !self.entries.contains_key(&key) && self.entries.len() >= max {
                self.evict_oldest();
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                snapshot,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        // Collect the key first: removing while an iterator guard is alive
        // would deadlock on the shard lock.
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            if self.entries.remove(&key).is_some() {
                debug!(%key, "evicted oldest cache entry");
                prometheus::record_cache_eviction();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::market::{MarketData, Status};

    fn snapshot(symbol: &str, latest_price: f64) -> Arc<MarketSnapshot> {
        Arc::new(MarketSnapshot {
            symbol: symbol.to_string(),
            timestamp: "2024-01-03T00:00:00.000000".to_string(),
            status: Status::Success,
            market_data: MarketData {
                latest_price,
                price_change: 0.0,
                price_change_percent: 0.0,
                current_volume: 0,
                volume_ratio: 1.0,
                price_volatility: 0.0,
                trading_date: "2024-01-03".to_string(),
            },
            price_history: Vec::new(),
            data_points: 0,
        })
    }

    #[test]
    fn identical_fields_produce_identical_keys() {
        let a = CacheKey::new("VNM", "2024-01-01", "2024-02-01", "1D");
        let b = CacheKey::from(&StockQuery::new("VNM", "2024-01-01", "2024-02-01", "1D"));
        assert_eq!(a, b);
    }

    #[test]
    fn any_differing_field_produces_a_different_key() {
        let base = CacheKey::new("VNM", "2024-01-01", "2024-02-01", "1D");
        let variants = [
            CacheKey::new("FPT", "2024-01-01", "2024-02-01", "1D"),
            CacheKey::new("VNM", "2024-01-02", "2024-02-01", "1D"),
            CacheKey::new("VNM", "2024-01-01", "2024-02-02", "1D"),
            CacheKey::new("VNM", "2024-01-01", "2024-02-01", "1H"),
            CacheKey::new("VNM", "2024-01-01", "2024-02-01", ""),
        ];
        for variant in variants {
            assert_ne!(base, variant);
        }
    }

    #[test]
    fn separator_inside_a_field_does_not_collide() {
        let a = CacheKey::new("A_B", "C", "", "");
        let b = CacheKey::new("A", "B_C", "", "");
        assert_eq!(a.to_string(), b.to_string());
        assert_ne!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_fresh_just_under_ttl() {
        let cache = SnapshotCache::new(Duration::from_secs(30));
        let key = CacheKey::new("VNM", "2024-01-01", "2024-02-01", "1D");
        cache.put(key.clone(), snapshot("VNM", 84.0));

        tokio::time::advance(Duration::from_millis(29_999)).await;

        let hit = cache.get(&key).expect("entry should still be fresh");
        assert_eq!(hit.market_data.latest_price, 84.0);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_stale_at_ttl_but_not_removed() {
        let cache = SnapshotCache::new(Duration::from_secs(30));
        let key = CacheKey::new("VNM", "2024-01-01", "2024-02-01", "1D");
        cache.put(key.clone(), snapshot("VNM", 84.0));

        tokio::time::advance(Duration::from_secs(30)).await;

        assert!(cache.get(&key).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn put_overwrites_and_restamps() {
        let cache = SnapshotCache::new(Duration::from_secs(30));
        let key = CacheKey::new("VNM", "2024-01-01", "2024-02-01", "1D");
        cache.put(key.clone(), snapshot("VNM", 80.0));

        tokio::time::advance(Duration::from_secs(31)).await;
        cache.put(key.clone(), snapshot("VNM", 90.0));

        let hit = cache.get(&key).expect("overwrite should be fresh");
        assert_eq!(hit.market_data.latest_price, 90.0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_cache_evicts_oldest_entry() {
        let cache = SnapshotCache::new(Duration::from_secs(30)).with_max_entries(Some(2));
        let first = CacheKey::new("AAA", "", "", "");
        let second = CacheKey::new("BBB", "", "", "");
        let third = CacheKey::new("CCC", "", "", "");

        cache.put(first.clone(), snapshot("AAA", 1.0));
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.put(second.clone(), snapshot("BBB", 2.0));
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.put(third.clone(), snapshot("CCC", 3.0));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&first).is_none());
        assert!(cache.get(&second).is_some());
        assert!(cache.get(&third).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_cache_overwrite_does_not_evict() {
        let cache = SnapshotCache::new(Duration::from_secs(30)).with_max_entries(Some(2));
        let first = CacheKey::new("AAA", "", "", "");
        let second = CacheKey::new("BBB", "", "", "");

        cache.put(first.clone(), snapshot("AAA", 1.0));
        cache.put(second.clone(), snapshot("BBB", 2.0));
        cache.put(first.clone(), snapshot("AAA", 1.5));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&second).is_some());
    }

    #[test]
    fn unbounded_cache_keeps_everything() {
        let cache = SnapshotCache::default();
        for i in 0..500 {
            cache.put(CacheKey::new(&format!("S{i}"), "", "", ""), snapshot("S", 1.0));
        }
        assert_eq!(cache.len(), 500);
    }
}
