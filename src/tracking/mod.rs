mod chain;
mod fetcher;
mod select;
mod snapshot_fetcher;

pub use chain::track_to_production;
pub use fetcher::PrFetcher;
pub use select::select_best;
pub use snapshot_fetcher::SnapshotFetcher;
