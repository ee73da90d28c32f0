use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::header::{ACCEPT, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;
use crate::market_data::traits::Fetcher;
use crate::market_data::types::RawRow;

pub const DEFAULT_BASE_URL: &str = "https://trading.vietcap.com.vn/api";

const OHLC_PATH: &str = "/chart/OHLCChart/gap";
const SITE_ORIGIN: &str = "https://trading.vietcap.com.vn";
const SITE_REFERER: &str = "https://trading.vietcap.com.vn/";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Exchange-local offset (Asia/Ho_Chi_Minh, no DST).
const MARKET_UTC_OFFSET_SECS: i32 = 7 * 3600;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OhlcRequest<'a> {
    time_frame: &'static str,
    symbols: [&'a str; 1],
    from: i64,
    to: i64,
}

/// One symbol's columns. Timestamps arrive as strings (sometimes numbers);
/// any column may be shorter than `t` or contain nulls.
#[derive(Debug, Deserialize)]
struct OhlcItem {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    o: Vec<Option<f64>>,
    #[serde(default)]
    h: Vec<Option<f64>>,
    #[serde(default)]
    l: Vec<Option<f64>>,
    #[serde(default)]
    c: Vec<Option<f64>>,
    #[serde(default)]
    v: Vec<Option<f64>>,
    #[serde(default)]
    t: Vec<Value>,
}

/// `Fetcher` backed by the VietCap trading chart API.
#[derive(Debug, Clone)]
pub struct VietcapFetcher {
    client: Client,
    base_url: String,
}

impl VietcapFetcher {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder().user_agent(BROWSER_USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Fetcher for VietcapFetcher {
    fn name(&self) -> &'static str {
        "vietcap"
    }

    async fn fetch(
        &self,
        symbol: &str,
        start_date: &str,
        end_date: &str,
        interval: &str,
    ) -> Result<Vec<RawRow>, FetchError> {
        let (from, to) = unix_range(start_date, end_date)?;
        let body = OhlcRequest {
            time_frame: time_frame(interval),
            symbols: [symbol],
            from,
            to,
        };

        debug!(symbol, from, to, time_frame = body.time_frame, "requesting OHLC chart");

        let response = self
            .client
            .post(format!("{}{}", self.base_url, OHLC_PATH))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(ORIGIN, SITE_ORIGIN)
            .header(REFERER, SITE_REFERER)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_ohlc_response(&text, symbol)
    }
}

/// Start date's midnight through the end of the end date, market time.
fn unix_range(start_date: &str, end_date: &str) -> Result<(i64, i64), FetchError> {
    let start = parse_date("start_date", start_date)?;
    let end = parse_date("end_date", end_date)?;
    let end_exclusive = end
        .checked_add_days(Days::new(1))
        .ok_or_else(|| FetchError::InvalidDate {
            field: "end_date",
            value: end_date.to_string(),
        })?;

    Ok((market_midnight(start), market_midnight(end_exclusive)))
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, FetchError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| FetchError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

fn market_midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp() - i64::from(MARKET_UTC_OFFSET_SECS)
}

fn time_frame(interval: &str) -> &'static str {
    match interval {
        "1m" => "ONE_MINUTE",
        "5m" => "FIVE_MINUTES",
        "15m" => "FIFTEEN_MINUTES",
        "30m" => "THIRTY_MINUTES",
        "1H" | "1h" => "ONE_HOUR",
        "4H" | "4h" => "FOUR_HOURS",
        "1D" | "1d" => "ONE_DAY",
        "1W" | "1w" => "ONE_WEEK",
        "1M" => "ONE_MONTH",
        _ => "ONE_DAY",
    }
}

fn parse_ohlc_response(body: &str, symbol: &str) -> Result<Vec<RawRow>, FetchError> {
    let items: Vec<OhlcItem> = serde_json::from_str(body)?;

    let item = match items
        .iter()
        .position(|item| item.symbol.eq_ignore_ascii_case(symbol))
    {
        Some(idx) => items.into_iter().nth(idx),
        None => items.into_iter().next(),
    };

    Ok(item.map(into_rows).unwrap_or_default())
}

fn into_rows(item: OhlcItem) -> Vec<RawRow> {
    let at = |column: &[Option<f64>], i: usize| column.get(i).copied().flatten();

    (0..item.t.len())
        .map(|i| RawRow {
            time: item.t.get(i).and_then(parse_timestamp),
            open: at(&item.o, i),
            high: at(&item.h, i),
            low: at(&item.l, i),
            close: at(&item.c, i),
            volume: at(&item.v, i).map(|v| v.round() as i64),
        })
        .collect()
}

fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    let secs = match value {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        _ => return None,
    };

    let local_secs = secs.checked_add(i64::from(MARKET_UTC_OFFSET_SECS))?;
    DateTime::from_timestamp(local_secs, 0).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_intervals_to_time_frames() {
        assert_eq!(time_frame("1D"), "ONE_DAY");
        assert_eq!(time_frame("1d"), "ONE_DAY");
        assert_eq!(time_frame("1h"), "ONE_HOUR");
        assert_eq!(time_frame("15m"), "FIFTEEN_MINUTES");
        assert_eq!(time_frame("1M"), "ONE_MONTH");
        assert_eq!(time_frame(""), "ONE_DAY");
        assert_eq!(time_frame("weird"), "ONE_DAY");
    }

    #[test]
    fn range_covers_the_whole_end_date() {
        let (from, to) = unix_range("2024-01-02", "2024-01-03").unwrap();
        // 2024-01-02T00:00:00+07:00
        assert_eq!(from, 1_704_128_400);
        assert_eq!(to - from, 2 * 86_400);
    }

    #[test]
    fn malformed_dates_are_rejected_before_any_request() {
        let err = unix_range("2024/01/02", "2024-01-03").unwrap_err();
        assert!(matches!(err, FetchError::InvalidDate { field: "start_date", .. }));

        let err = unix_range("2024-01-02", "").unwrap_err();
        assert!(matches!(err, FetchError::InvalidDate { field: "end_date", .. }));
    }

    #[test]
    fn parses_ohlc_payload_with_string_timestamps() {
        let body = r#"[
            {
                "symbol": "VNM",
                "o": [79.5, 80.5],
                "h": [82, 85],
                "l": [79, 83],
                "c": [80, 84],
                "v": [100, 150],
                "t": ["1704128400", "1704214800"]
            }
        ]"#;

        let rows = parse_ohlc_response(body, "VNM").unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].close, Some(84.0));
        assert_eq!(rows[1].volume, Some(150));
        let date = rows[0].time.unwrap().format("%Y-%m-%d").to_string();
        assert_eq!(date, "2024-01-02");
    }

    #[test]
    fn short_columns_and_nulls_become_missing_fields() {
        let body = r#"[
            {"symbol": "FPT", "c": [10, null], "h": [11], "t": [1704128400, "bad"]}
        ]"#;

        let rows = parse_ohlc_response(body, "FPT").unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].close, Some(10.0));
        assert_eq!(rows[0].low, None);
        assert_eq!(rows[0].volume, None);
        assert_eq!(rows[1].close, None);
        assert_eq!(rows[1].high, None);
        assert_eq!(rows[1].time, None);
    }

    #[test]
    fn picks_the_requested_symbol() {
        let body = r#"[
            {"symbol": "AAA", "c": [1], "t": ["1704128400"]},
            {"symbol": "VNM", "c": [84], "t": ["1704128400"]}
        ]"#;

        let rows = parse_ohlc_response(body, "VNM").unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, Some(84.0));
    }

    #[test]
    fn empty_payload_means_no_rows() {
        assert!(parse_ohlc_response("[]", "VNM").unwrap().is_empty());
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        let err = parse_ohlc_response("<html>", "VNM").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
