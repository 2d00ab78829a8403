// Market Pulse - real-time market microstructure feature pipeline
//
// Layers:
//   core         - shared types, configuration, logging
//   market       - in-memory market data store and event rate tracking
//   analyzers    - per-signal feature analyzers (imbalance, walls, flow,
//                  volatility, pump, fee/leverage)
//   orchestrator - per-symbol update loops with adaptive cadence

pub mod analyzers;
pub mod core;
pub mod market;
pub mod orchestrator;

pub use crate::core::config::{ConfigError, FeatureConfig};
pub use crate::core::logger::setup_logging;
pub use crate::core::types::{
    BookSide, Candle, OrderbookSnapshot, PriceLevel, SymbolMeta, Timeframe, Trade, TradeSide,
};
pub use crate::market::{EventRateTracker, MarketDataSource, MicrostructureStore};
pub use crate::orchestrator::{
    FeatureOrchestrator, FeatureState, FeatureSummary, HealthStatus, MarketCondition,
    OrchestratorError, PipelineStatus,
};
