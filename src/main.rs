use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stock_data_broker::api;
use stock_data_broker::config::Config;
use stock_data_broker::market_data::adapters::VietcapFetcher;
use stock_data_broker::metrics::init_metrics_server;
use stock_data_broker::service::StockService;
use stock_data_broker::state::snapshot_cache::SnapshotCache;

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    // Fixed-size worker pool, independent of request volume.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> Result<()> {
    if config.metrics_port != 0 {
        init_metrics_server(config.metrics_port).context("failed to start metrics exporter")?;
    }

    let fetcher = VietcapFetcher::new(config.provider_url.clone())
        .context("failed to build provider client")?;
    let cache = SnapshotCache::new(config.cache_ttl).with_max_entries(config.cache_max_entries);
    let service =
        StockService::new(cache, Arc::new(fetcher)).with_fetch_timeout(config.fetch_timeout);

    let app = api::router(service, config.max_concurrent_requests);
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        %addr,
        workers = config.worker_threads,
        max_concurrent_requests = config.max_concurrent_requests,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        cache_max_entries = ?config.cache_max_entries,
        fetch_timeout_secs = config.fetch_timeout.as_secs(),
        "stock-data-broker listening"
    );

    // No graceful drain: in-flight requests are dropped on Ctrl-C.
    tokio::select! {
        res = axum::serve(listener, app).into_future() => {
            match res {
                Ok(()) => warn!("server exited"),
                Err(err) => warn!(error = %err, "server returned error"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl-C, shutting down");
        }
    }

    Ok(())
}
