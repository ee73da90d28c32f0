use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// One entry of the bounded price history.
/// Missing source values are already resolved to zero / empty date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: String,
    pub close: f64,
    pub volume: i64,
    pub high: f64,
    pub low: f64,
}

/// Derived metrics over the retained window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub latest_price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub current_volume: i64,
    pub volume_ratio: f64,
    pub price_volatility: f64,
    pub trading_date: String,
}

/// Normalized, analysis-ready view of one symbol over a date range.
/// This is the only thing the cache ever stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub timestamp: String,
    pub status: Status,
    pub market_data: MarketData,
    pub price_history: Vec<PricePoint>,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub symbol: String,
    pub timestamp: String,
    pub status: Status,
    pub error: String,
}

impl ErrorResult {
    pub fn new(symbol: &str, error: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp: now_iso8601(),
            status: Status::Error,
            error: error.into(),
        }
    }
}

/// Outcome of a `GetStockData` call. Serializes to the flat wire shape,
/// with `status` telling the two variants apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StockQueryResult {
    Success(Arc<MarketSnapshot>),
    Error(ErrorResult),
}

impl StockQueryResult {
    pub fn status(&self) -> Status {
        match self {
            Self::Success(_) => Status::Success,
            Self::Error(_) => Status::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Success(snapshot) => &snapshot.symbol,
            Self::Error(err) => &err.symbol,
        }
    }

    pub fn snapshot(&self) -> Option<&Arc<MarketSnapshot>> {
        match self {
            Self::Success(snapshot) => Some(snapshot),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Error(err) => Some(&err.error),
        }
    }
}

/// Response build time, ISO-8601 with microseconds.
pub fn now_iso8601() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
