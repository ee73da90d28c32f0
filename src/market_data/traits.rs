use async_trait::async_trait;
use crate::error::FetchError;
use crate::market_data::types::RawRow;

/// Source of raw OHLCV rows.
///
/// `symbol` arrives upper-cased; dates and interval are passed through
/// exactly as the caller sent them. `Ok(vec![])` means the symbol exists
/// but has no data in range.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        symbol: &str,
        start_date: &str,
        end_date: &str,
        interval: &str,
    ) -> Result<Vec<RawRow>, FetchError>;
}
