use std::time::Duration;

use crate::market_data::adapters::vietcap::DEFAULT_BASE_URL;

/// Broker configuration, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: String,
    pub bind: String,
    pub port: u16,
    /// Size of the tokio worker pool.
    pub worker_threads: usize,
    /// Requests serviced at once; the rest wait.
    pub max_concurrent_requests: usize,
    pub cache_ttl: Duration,
    /// `None` keeps the cache unbounded.
    pub cache_max_entries: Option<usize>,
    pub fetch_timeout: Duration,
    pub provider_url: String,
    /// 0 disables the Prometheus exporter.
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bind: "0.0.0.0".to_string(),
            port: 50051,
            worker_threads: 10,
            max_concurrent_requests: 10,
            cache_ttl: Duration::from_secs(30),
            cache_max_entries: None,
            fetch_timeout: Duration::from_secs(15),
            provider_url: DEFAULT_BASE_URL.to_string(),
            metrics_port: 9000,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // dotenvy loads .env, but doesn't override already-set env vars
        dotenvy::dotenv().ok();

        Ok(Self::from_lookup(|name| std::env::var(name).ok()))
    }

    /// Builds the config from any variable source. Blank or unparseable
    /// values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| {
            lookup(name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let parse = |name: &str| get(name).and_then(|s| s.parse::<u64>().ok());

        Self {
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            bind: get("BROKER_BIND").unwrap_or(defaults.bind),
            port: get("BROKER_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            worker_threads: parse("BROKER_WORKER_THREADS")
                .map(|n| n as usize)
                .unwrap_or(defaults.worker_threads)
                .max(1),
            max_concurrent_requests: parse("BROKER_MAX_CONCURRENT_REQUESTS")
                .map(|n| n as usize)
                .unwrap_or(defaults.max_concurrent_requests)
                .max(1),
            cache_ttl: parse("BROKER_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            cache_max_entries: parse("BROKER_CACHE_MAX_ENTRIES")
                .map(|n| (n as usize).max(1))
                .or(defaults.cache_max_entries),
            fetch_timeout: parse("BROKER_FETCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            provider_url: get("BROKER_PROVIDER_URL").unwrap_or(defaults.provider_url),
            metrics_port: get("BROKER_METRICS_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.metrics_port),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
