// Fee and Leverage Analyzer
// Execution cost floor and leverage sizing under current volatility

use serde::Serialize;

use crate::analyzers::volatility::{VolatilityReading, VolatilityRisk};
use crate::core::config::FeeLeverageConfig;
use crate::core::types::SymbolMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LiquidationRiskBand {
    VerySafe,
    Safe,
    Moderate,
    Risky,
    Dangerous,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeeLeverageReading {
    /// Estimated one-way slippage as a fraction of price
    pub slippage_pct: f64,
    /// Round-trip fees plus slippage plus margin, as a fraction of price
    pub min_profitable_move_maker: f64,
    pub min_profitable_move_taker: f64,
    /// Volatility-scaled recommended leverage, at least 1
    pub default_leverage: u32,
    pub max_leverage: f64,
    /// 0..1, higher is safer
    pub liquidation_safety: f64,
    pub risk_band: LiquidationRiskBand,
}

/// Stateless per-symbol cost model. Recomputed after volatility so the
/// leverage recommendation reflects the same update cycle.
pub struct FeeLeverageAnalyzer {
    config: FeeLeverageConfig,
}

impl FeeLeverageAnalyzer {
    pub fn new(config: FeeLeverageConfig) -> Self {
        Self { config }
    }

    pub fn analyze(
        &self,
        meta: &SymbolMeta,
        volatility: Option<&VolatilityReading>,
        price: f64,
    ) -> FeeLeverageReading {
        // Without a volatility read the model assumes a medium regime
        let risk = volatility
            .map(|v| v.risk_level)
            .unwrap_or(VolatilityRisk::Medium);

        let base_slippage = match risk {
            VolatilityRisk::VeryLow => self.config.base_slippage_very_low,
            VolatilityRisk::Low => self.config.base_slippage_low,
            VolatilityRisk::Medium => self.config.base_slippage_medium,
            VolatilityRisk::High => self.config.base_slippage_high,
            VolatilityRisk::Extreme => self.config.base_slippage_extreme,
        };
        let atr_slippage = match volatility {
            Some(v) if price > 0.0 => 0.5 * v.atr_5s / price,
            _ => 0.0,
        };
        let slippage_pct = base_slippage.max(atr_slippage);

        let min_profitable_move_maker =
            2.0 * meta.maker_fee + slippage_pct + self.config.safety_margin_maker;
        let min_profitable_move_taker =
            2.0 * meta.taker_fee + slippage_pct + self.config.safety_margin_taker;

        let risk_multiplier = match risk {
            VolatilityRisk::VeryLow => 1.0,
            VolatilityRisk::Low => 0.8,
            VolatilityRisk::Medium => 0.6,
            VolatilityRisk::High => 0.4,
            VolatilityRisk::Extreme => 0.2,
        };
        let default_leverage = ((meta.max_leverage * self.config.leverage_utilization
            * risk_multiplier)
            .floor() as u32)
            .max(1);

        let vol_score = volatility.map(|v| v.volatility_score).unwrap_or(0.5);
        let explosion = volatility.map(|v| v.explosion).unwrap_or(false);
        let utilization = if meta.max_leverage > 0.0 {
            default_leverage as f64 / meta.max_leverage
        } else {
            1.0
        };
        let liquidation_safety = (1.0
            - 0.4 * utilization
            - 0.4 * vol_score
            - 0.3 * if explosion { 1.0 } else { 0.0 })
        .clamp(0.0, 1.0);

        let risk_band = if liquidation_safety >= 0.8 {
            LiquidationRiskBand::VerySafe
        } else if liquidation_safety >= 0.6 {
            LiquidationRiskBand::Safe
        } else if liquidation_safety >= 0.4 {
            LiquidationRiskBand::Moderate
        } else if liquidation_safety >= 0.2 {
            LiquidationRiskBand::Risky
        } else {
            LiquidationRiskBand::Dangerous
        };

        FeeLeverageReading {
            slippage_pct,
            min_profitable_move_maker,
            min_profitable_move_taker,
            default_leverage,
            max_leverage: meta.max_leverage,
            liquidation_safety,
            risk_band,
        }
    }
}
