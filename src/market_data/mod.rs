pub mod adapters;
pub mod normalizer;
pub mod traits;
pub mod types;
