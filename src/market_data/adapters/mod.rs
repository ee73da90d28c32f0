pub mod vietcap;

pub use vietcap::VietcapFetcher;
