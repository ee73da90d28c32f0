use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::error::FetchError;
use crate::market_data::normalizer::normalize;
use crate::market_data::traits::Fetcher;
use crate::market_data::types::{RawRow, StockQuery};
use crate::metrics::prometheus;
use crate::state::market::{ErrorResult, StockQueryResult, now_iso8601};
use crate::state::snapshot_cache::{CacheKey, SnapshotCache};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Interval used by the batch call when the caller leaves it blank.
pub const DEFAULT_BATCH_INTERVAL: &str = "1d";

/// What came back from the provider, by value.
#[derive(Debug)]
pub enum FetchOutcome {
    Rows(Vec<RawRow>),
    NoData,
    Failed(FetchError),
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiStockResult {
    pub timestamp: String,
    pub total_symbols: usize,
    pub data: BTreeMap<String, StockQueryResult>,
}

/// Entry point for every request: cache lookup, fetch on miss, normalize,
/// cache write. Failures never escape; they come back as `ErrorResult`.
///
/// Cheap to clone; all workers share the same cache.
#[derive(Clone)]
pub struct StockService {
    cache: SnapshotCache,
    fetcher: Arc<dyn Fetcher>,
    fetch_timeout: Duration,
}

impl StockService {
    pub fn new(cache: SnapshotCache, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            cache,
            fetcher,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub async fn get_stock_data(&self, query: &StockQuery) -> StockQueryResult {
        let key = CacheKey::from(query);

        if let Some(snapshot) = self.cache.get(&key) {
            info!(symbol = %query.symbol, %key, "cache hit");
            prometheus::record_cache_hit();
            return StockQueryResult::Success(snapshot);
        }
        prometheus::record_cache_miss();

        match self.fetch(query).await {
            FetchOutcome::Rows(rows) => {
                let snapshot = Arc::new(normalize(&query.symbol, &rows));
                self.cache.put(key, Arc::clone(&snapshot));

                info!(
                    symbol = %snapshot.symbol,
                    data_points = snapshot.data_points,
                    latest_price = snapshot.market_data.latest_price,
                    "fetched and cached"
                );
                StockQueryResult::Success(snapshot)
            }
            FetchOutcome::NoData => {
                warn!(symbol = %query.symbol, "no data found");
                StockQueryResult::Error(ErrorResult::new(
                    &query.symbol,
                    format!("No data found for symbol: {}", query.symbol.to_uppercase()),
                ))
            }
            FetchOutcome::Failed(err) => {
                error!(symbol = %query.symbol, kind = err.kind(), error = %err, "fetch failed");
                prometheus::record_fetch_error(err.kind());
                StockQueryResult::Error(ErrorResult::new(&query.symbol, err.to_string()))
            }
        }
    }

    /// Serves every symbol through `get_stock_data`, concurrently.
    /// Results are keyed by the symbol exactly as requested.
    pub async fn get_multiple_stocks(
        &self,
        symbols: &[String],
        start_date: &str,
        end_date: &str,
        interval: &str,
    ) -> MultiStockResult {
        let interval = if interval.is_empty() {
            DEFAULT_BATCH_INTERVAL
        } else {
            interval
        };

        info!(
            total = symbols.len(),
            start_date,
            end_date,
            interval,
            "batch request"
        );

        let queries: Vec<StockQuery> = symbols
            .iter()
            .map(|symbol| StockQuery::new(symbol.as_str(), start_date, end_date, interval))
            .collect();
        let results = join_all(queries.iter().map(|query| self.get_stock_data(query))).await;

        MultiStockResult {
            timestamp: now_iso8601(),
            total_symbols: symbols.len(),
            data: symbols.iter().cloned().zip(results).collect(),
        }
    }

    async fn fetch(&self, query: &StockQuery) -> FetchOutcome {
        let symbol = query.symbol.to_uppercase();
        info!(
            symbol = %symbol,
            start_date = %query.start_date,
            end_date = %query.end_date,
            interval = %query.interval,
            provider = self.fetcher.name(),
            "fetching from provider"
        );

        let started = Instant::now();
        let result = tokio::time::timeout(
            self.fetch_timeout,
            self.fetcher
                .fetch(&symbol, &query.start_date, &query.end_date, &query.interval),
        )
        .await
        .unwrap_or(Err(FetchError::Timeout(self.fetch_timeout)));
        prometheus::record_fetch_latency_ms(started.elapsed().as_secs_f64() * 1_000.0);

        match result {
            Ok(rows) if rows.is_empty() => FetchOutcome::NoData,
            Ok(rows) => FetchOutcome::Rows(rows),
            Err(err) => FetchOutcome::Failed(err),
        }
    }
}
