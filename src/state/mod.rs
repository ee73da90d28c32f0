pub mod market;
pub mod snapshot_cache;
