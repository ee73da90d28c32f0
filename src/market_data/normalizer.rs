use crate::market_data::types::RawRow;
use crate::state::market::{MarketData, MarketSnapshot, PricePoint, Status, now_iso8601};
use std::cmp::Ordering;
use tracing::warn;

/// Most recent rows kept per snapshot.
pub const MAX_PRICE_HISTORY: usize = 200;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Turns raw provider rows into a snapshot.
///
/// Rows are sorted by time (untimed rows last), cut down to the newest
/// `MAX_PRICE_HISTORY`, and only then are the metrics derived, so every
/// average and comparison sees the retained window alone.
///
/// Callers must not pass an empty slice; the service reports "no data"
/// before getting here.
pub fn normalize(symbol: &str, rows: &[RawRow]) -> MarketSnapshot {
    let window = retain_recent(symbol, rows);
    debug_assert!(!window.is_empty(), "normalize called without rows");

    let price_history: Vec<PricePoint> = window.iter().map(to_price_point).collect();
    let market_data = derive_market_data(&window);

    MarketSnapshot {
        symbol: symbol.to_uppercase(),
        timestamp: now_iso8601(),
        status: Status::Success,
        market_data,
        data_points: price_history.len(),
        price_history,
    }
}

fn retain_recent<'a>(symbol: &str, rows: &'a [RawRow]) -> Vec<&'a RawRow> {
    let mut sorted: Vec<&RawRow> = rows.iter().collect();
    sorted.sort_by(|a, b| compare_time(a, b));

    if sorted.len() > MAX_PRICE_HISTORY {
        warn!(
            symbol,
            total = sorted.len(),
            kept = MAX_PRICE_HISTORY,
            "keeping only the most recent records"
        );
        sorted.drain(..sorted.len() - MAX_PRICE_HISTORY);
    }

    sorted
}

fn compare_time(a: &RawRow, b: &RawRow) -> Ordering {
    match (a.time, b.time) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn derive_market_data(window: &[&RawRow]) -> MarketData {
    let (Some(latest), Some(previous)) = (
        window.last(),
        window.iter().rev().nth(1).or(window.last()),
    ) else {
        return empty_market_data();
    };

    let latest_price = latest.close.unwrap_or(0.0);
    let previous_price = previous.close.unwrap_or(0.0);
    let price_change = latest_price - previous_price;
    let price_change_percent = if previous_price != 0.0 {
        price_change / previous_price * 100.0
    } else {
        0.0
    };

    let current_volume = latest.volume.unwrap_or(0);
    let avg_volume = average_volume(window);
    let volume_ratio = if avg_volume > 0.0 {
        current_volume as f64 / avg_volume
    } else {
        1.0
    };

    let high_low_spread = latest.high.unwrap_or(0.0) - latest.low.unwrap_or(0.0);
    let price_volatility = if latest_price > 0.0 {
        high_low_spread / latest_price * 100.0
    } else {
        0.0
    };

    MarketData {
        latest_price,
        price_change: round2(price_change),
        price_change_percent: round2(price_change_percent),
        current_volume,
        volume_ratio: round2(volume_ratio),
        price_volatility: round2(price_volatility),
        trading_date: format_date(latest),
    }
}

/// Mean over rows that carry a volume; 0 when none do.
fn average_volume(window: &[&RawRow]) -> f64 {
    let volumes: Vec<i64> = window.iter().filter_map(|row| row.volume).collect();
    if volumes.is_empty() {
        return 0.0;
    }
    volumes.iter().map(|&v| v as f64).sum::<f64>() / volumes.len() as f64
}

fn to_price_point(row: &&RawRow) -> PricePoint {
    PricePoint {
        date: format_date(row),
        close: row.close.unwrap_or(0.0),
        volume: row.volume.unwrap_or(0),
        high: row.high.unwrap_or(0.0),
        low: row.low.unwrap_or(0.0),
    }
}

fn format_date(row: &RawRow) -> String {
    row.time
        .map(|t| t.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

fn empty_market_data() -> MarketData {
    MarketData {
        latest_price: 0.0,
        price_change: 0.0,
        price_change_percent: 0.0,
        current_volume: 0,
        volume_ratio: 1.0,
        price_volatility: 0.0,
        trading_date: String::new(),
    }
}

/// Two decimal places, ties to even.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
