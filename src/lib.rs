pub mod api;
pub mod config;
pub mod error;
pub mod market_data;
pub mod metrics;
pub mod service;
pub mod state;

pub use error::FetchError;
pub use service::StockService;
