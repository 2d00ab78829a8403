// Feature analyzers - one module per signal family

pub mod fee_leverage;
pub mod flow;
pub mod imbalance;
pub mod pump;
pub mod volatility;
pub mod walls;
pub mod window;

pub use fee_leverage::{FeeLeverageAnalyzer, FeeLeverageReading, LiquidationRiskBand};
pub use flow::{FlowDeltaEngine, FlowReading, WindowFlow};
pub use imbalance::{ImbalanceReading, OrderbookImbalanceAnalyzer, ZoneImbalance};
pub use pump::{PumpReading, PumpRisk, PumpSignalAnalyzer};
pub use volatility::{VolatilityAnalyzer, VolatilityReading, VolatilityRisk};
pub use walls::{WallReading, WallRecord, WallSpoofingAnalyzer};
pub use window::TimeWindow;
