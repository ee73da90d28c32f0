use chrono::NaiveDateTime;
use serde::Deserialize;

/// One OHLCV row as handed back by the provider.
/// Every field is optional; the normalizer resolves gaps to zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub time: Option<NaiveDateTime>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

/// Parameters of a single `GetStockData` call.
/// Blank fields are kept verbatim; nothing here is normalized.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StockQuery {
    pub symbol: String,
    pub start_date: String,
    pub end_date: String,
    pub interval: String,
}

impl StockQuery {
    pub fn new(
        symbol: impl Into<String>,
        start_date: impl Into<String>,
        end_date: impl Into<String>,
        interval: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            start_date: start_date.into(),
            end_date: end_date.into(),
            interval: interval.into(),
        }
    }
}
