use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower::limit::GlobalConcurrencyLimitLayer;
use tracing::info;

use crate::market_data::types::StockQuery;
use crate::metrics::prometheus;
use crate::service::{MultiStockResult, StockService};
use crate::state::market::{Status, StockQueryResult};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MultiStockRequest {
    pub symbols: Vec<String>,
    pub start_date: String,
    pub end_date: String,
    pub interval: String,
}

// ── Route definitions ────────────────────────────────────────────────────

/// Assemble the RPC router. At most `max_concurrent_requests` calls are
/// serviced at once across both RPC routes; the rest queue. `/health`
/// sits outside the limit.
pub fn router(service: StockService, max_concurrent_requests: usize) -> Router {
    Router::new()
        .route("/v1/GetStockData", post(get_stock_data))
        .route("/v1/GetMultipleStocks", post(get_multiple_stocks))
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_requests.max(1)))
        .route("/health", get(health))
        .with_state(service)
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn get_stock_data(
    State(service): State<StockService>,
    Json(query): Json<StockQuery>,
) -> Json<StockQueryResult> {
    info!(
        symbol = %query.symbol,
        start_date = %query.start_date,
        end_date = %query.end_date,
        interval = %query.interval,
        "GetStockData request"
    );

    let result = service.get_stock_data(&query).await;
    prometheus::record_request("GetStockData", status_label(result.status()));
    Json(result)
}

async fn get_multiple_stocks(
    State(service): State<StockService>,
    Json(request): Json<MultiStockRequest>,
) -> Json<MultiStockResult> {
    let result = service
        .get_multiple_stocks(
            &request.symbols,
            &request.start_date,
            &request.end_date,
            &request.interval,
        )
        .await;
    prometheus::record_request("GetMultipleStocks", "success");
    Json(result)
}

async fn health(State(service): State<StockService>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "cached_entries": service.cache().len(),
    }))
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Success => "success",
        Status::Error => "error",
    }
}
