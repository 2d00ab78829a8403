// Core - shared types, configuration and logging

pub mod config;
pub mod logger;
pub mod types;

pub use config::{ConfigError, FeatureConfig};
pub use logger::setup_logging;
pub use types::{
    BookSide, Candle, DominantSide, OrderbookSnapshot, PriceLevel, SymbolMeta, Timeframe, Trade,
    TradeSide,
};
