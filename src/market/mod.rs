// Market data layer - in-memory store and global event rate

pub mod rate;
pub mod store;

pub use rate::EventRateTracker;
pub use store::{MarketDataSource, MicrostructureStore, StoreStats};
