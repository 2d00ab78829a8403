// Configuration for the Feature Pipeline
// Explicit named-field sections with documented defaults, JSON file overlay

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Adaptive cadence tiers: the update interval chosen for a given
/// global events-per-second rate. Thresholds must be increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    pub quiet_interval_ms: u64,
    pub moderate_interval_ms: u64,
    pub busy_interval_ms: u64,
    pub saturated_interval_ms: u64,
    pub moderate_eps: f64,
    pub busy_eps: f64,
    pub saturated_eps: f64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            quiet_interval_ms: 50,
            moderate_interval_ms: 100,
            busy_interval_ms: 200,
            saturated_interval_ms: 300,
            moderate_eps: 100.0,
            busy_eps: 500.0,
            saturated_eps: 1500.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Orderbook levels pulled per update
    pub orderbook_depth: usize,
    /// Recent trades pulled per update
    pub trade_fetch_limit: usize,
    /// Candles pulled per timeframe per update
    pub candle_fetch_limit: usize,
    /// A symbol counts as active if updated within this window
    pub stale_after_secs: i64,
    /// First retry delay for symbols with no data yet
    pub awaiting_data_backoff_base_secs: u64,
    /// Retry delay cap
    pub awaiting_data_backoff_max_secs: u64,
    pub cadence: CadenceConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            orderbook_depth: 50,
            trade_fetch_limit: 200,
            candle_fetch_limit: 100,
            stale_after_secs: 60,
            awaiting_data_backoff_base_secs: 5,
            awaiting_data_backoff_max_secs: 60,
            cadence: CadenceConfig::default(),
        }
    }
}

// ============================================================================
// Imbalance
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImbalanceConfig {
    /// |TOB imbalance| above which a side is dominant
    pub dominance_threshold: f64,
    /// Zone boundaries as % distance from mid price
    pub zone_short_pct: f64,
    pub zone_mid_pct: f64,
    pub zone_far_pct: f64,
    /// Total depth (base quantity) at which the depth confidence factor saturates
    pub depth_norm: f64,
    /// Spread % at which spread quality decays to zero
    pub spread_quality_max_pct: f64,
}

impl Default for ImbalanceConfig {
    fn default() -> Self {
        Self {
            dominance_threshold: 0.25,
            zone_short_pct: 0.05,
            zone_mid_pct: 0.15,
            zone_far_pct: 0.40,
            depth_norm: 1000.0,
            spread_quality_max_pct: 0.5,
        }
    }
}

// ============================================================================
// Walls / Spoofing
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallConfig {
    /// Quantity multiple of the side average that qualifies as a wall
    pub wall_multiplier: f64,
    /// Minimum wall notional in USD
    pub min_wall_size_usd: f64,
    /// Walls further than this % from current price are ignored
    pub max_distance_pct: f64,
    /// Levels inspected per side
    pub levels_per_side: usize,
    /// Minimum tracked lifetime before a vanished wall counts as a spoof
    pub spoof_min_lifetime_ms: i64,
    /// Price must have approached within this % for a vanish to count as a spoof
    pub spoof_approach_pct: f64,
    /// Trackers unseen for this long are evicted
    pub tracker_ttl_ms: i64,
    /// Spoof events older than this stop contributing to the score
    pub spoof_event_window_ms: i64,
    /// Spread % below which both-sided walls look manipulative
    pub tight_spread_pct: f64,
    /// Same-side walls within this % of each other count as layering
    pub layering_proximity_pct: f64,
    /// Absorption lookback
    pub absorption_window_ms: i64,
    /// Trades within this % of current price count toward absorption
    pub absorption_proximity_pct: f64,
    /// Snapshots compared for wall persistence
    pub persistence_snapshots: usize,
    /// Price tolerance (%) when matching walls across snapshots
    pub persistence_tolerance_pct: f64,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            wall_multiplier: 3.0,
            min_wall_size_usd: 50_000.0,
            max_distance_pct: 1.0,
            levels_per_side: 20,
            spoof_min_lifetime_ms: 2000,
            spoof_approach_pct: 0.2,
            tracker_ttl_ms: 30_000,
            spoof_event_window_ms: 60_000,
            tight_spread_pct: 0.02,
            layering_proximity_pct: 0.05,
            absorption_window_ms: 5000,
            absorption_proximity_pct: 0.1,
            persistence_snapshots: 5,
            persistence_tolerance_pct: 0.1,
        }
    }
}

// ============================================================================
// Flow / Delta
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// |5s delta ratio| above which a side dominates
    pub dominance_threshold: f64,
    /// Streaks shorter than this report 0 to suppress noise
    pub min_streak_ms: i64,
    /// |ratio| above which a window counts toward flow consistency
    pub consistency_threshold: f64,
    /// Ring buffer capacities per window
    pub capacity_1s: usize,
    pub capacity_5s: usize,
    pub capacity_15s: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            dominance_threshold: 0.2,
            min_streak_ms: 3000,
            consistency_threshold: 0.1,
            capacity_1s: 120,
            capacity_5s: 60,
            capacity_15s: 40,
        }
    }
}

// ============================================================================
// Volatility
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityConfig {
    /// ATR averaging period (fewer bars used when unavailable)
    pub atr_period: usize,
    /// Rolling ATR history length used for normalization
    pub rolling_window: usize,
    /// Minimum history points before the score leaves its neutral default
    pub min_history_for_score: usize,
    /// 1s ATR ratio vs its rolling average that flags an explosion
    pub explosion_ratio: f64,
    /// History samples averaged for the explosion baseline
    pub explosion_samples: usize,
    /// Explosion strength above which risk is forced to extreme
    pub extreme_strength: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            rolling_window: 60,
            min_history_for_score: 5,
            explosion_ratio: 3.0,
            explosion_samples: 60,
            extreme_strength: 4.0,
        }
    }
}

// ============================================================================
// Pump signals
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Rolling baseline window
    pub baseline_window_ms: i64,
    /// Price-history points required before scoring
    pub min_history_points: usize,
    /// |5s price change| (fraction) at which its term saturates
    pub price_change_cap: f64,
    /// Log base for volume spike normalization
    pub volume_spike_log_base: f64,
    /// Trades/sec at which the frequency term saturates
    pub trade_frequency_cap: f64,
    /// Depth band (± % of price) measured for orderbook thinning
    pub depth_band_pct: f64,
    /// Component weights (must sum to 1.0)
    pub weight_price_change: f64,
    pub weight_volume_spike: f64,
    pub weight_thinning: f64,
    pub weight_frequency: f64,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            baseline_window_ms: 300_000,
            min_history_points: 10,
            price_change_cap: 0.20,
            volume_spike_log_base: 20.0,
            trade_frequency_cap: 20.0,
            depth_band_pct: 2.0,
            weight_price_change: 0.40,
            weight_volume_spike: 0.30,
            weight_thinning: 0.20,
            weight_frequency: 0.10,
        }
    }
}

// ============================================================================
// Fee / Leverage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeLeverageConfig {
    /// Fixed slippage floor (fraction of price) per volatility risk level
    pub base_slippage_very_low: f64,
    pub base_slippage_low: f64,
    pub base_slippage_medium: f64,
    pub base_slippage_high: f64,
    pub base_slippage_extreme: f64,
    /// Extra safety margin added to the minimum profitable move
    pub safety_margin_maker: f64,
    pub safety_margin_taker: f64,
    /// Fraction of max leverage used before risk scaling
    pub leverage_utilization: f64,
}

impl Default for FeeLeverageConfig {
    fn default() -> Self {
        Self {
            base_slippage_very_low: 0.0002,
            base_slippage_low: 0.0005,
            base_slippage_medium: 0.001,
            base_slippage_high: 0.002,
            base_slippage_extreme: 0.004,
            safety_margin_maker: 0.0005,
            safety_margin_taker: 0.001,
            leverage_utilization: 0.8,
        }
    }
}

// ============================================================================
// Aggregate config
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub orchestrator: OrchestratorConfig,
    pub imbalance: ImbalanceConfig,
    pub walls: WallConfig,
    pub flow: FlowConfig,
    pub volatility: VolatilityConfig,
    pub pump: PumpConfig,
    pub fee_leverage: FeeLeverageConfig,
}

impl FeatureConfig {
    /// Load configuration from a JSON file, overlaying section by section
    /// on top of the defaults. Missing file or sections keep defaults.
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let file = Path::new(path);
        if !file.exists() {
            warn!(path = path, "Config file not found, using defaults");
            return Ok(config);
        }

        let content = fs::read_to_string(file)?;
        let sections: HashMap<String, serde_json::Value> = serde_json::from_str(&content)?;

        macro_rules! overlay {
            ($key:literal, $field:ident, $ty:ty) => {
                if let Some(value) = sections.get($key) {
                    config.$field = serde_json::from_value::<$ty>(value.clone())?;
                }
            };
        }

        overlay!("orchestrator", orchestrator, OrchestratorConfig);
        overlay!("imbalance", imbalance, ImbalanceConfig);
        overlay!("walls", walls, WallConfig);
        overlay!("flow", flow, FlowConfig);
        overlay!("volatility", volatility, VolatilityConfig);
        overlay!("pump", pump, PumpConfig);
        overlay!("fee_leverage", fee_leverage, FeeLeverageConfig);

        config.validate()?;
        info!(path = path, "Configuration loaded");
        Ok(config)
    }

    /// Save the full configuration to a JSON file
    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = path, "Configuration saved");
        Ok(())
    }

    /// Reject configurations that would break pipeline invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cadence = &self.orchestrator.cadence;
        if !(cadence.moderate_eps < cadence.busy_eps && cadence.busy_eps < cadence.saturated_eps) {
            return Err(ConfigError::Validation(
                "cadence eps thresholds must be strictly increasing".to_string(),
            ));
        }
        if !(cadence.quiet_interval_ms <= cadence.moderate_interval_ms
            && cadence.moderate_interval_ms <= cadence.busy_interval_ms
            && cadence.busy_interval_ms <= cadence.saturated_interval_ms)
        {
            return Err(ConfigError::Validation(
                "cadence intervals must be non-decreasing".to_string(),
            ));
        }

        if self.walls.wall_multiplier <= 1.0 {
            return Err(ConfigError::Validation(
                "wall_multiplier must be > 1.0".to_string(),
            ));
        }
        if self.walls.min_wall_size_usd <= 0.0 {
            return Err(ConfigError::Validation(
                "min_wall_size_usd must be positive".to_string(),
            ));
        }

        let weight_sum = self.pump.weight_price_change
            + self.pump.weight_volume_spike
            + self.pump.weight_thinning
            + self.pump.weight_frequency;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Validation(format!(
                "pump weights must sum to 1.0, got {weight_sum}"
            )));
        }

        if self.volatility.atr_period == 0 || self.volatility.rolling_window == 0 {
            return Err(ConfigError::Validation(
                "volatility periods must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
