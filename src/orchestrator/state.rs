// Per-Symbol Feature State
// Merged analyzer outputs plus composite risk and regime classification

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyzers::{
    FeeLeverageReading, FlowReading, ImbalanceReading, PumpReading, VolatilityReading,
    VolatilityRisk, WallReading,
};
use crate::core::types::DominantSide;

/// Coarse market regime derived from the latest analyzer readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketCondition {
    /// Volatility explosion or extreme risk
    Explosive,
    /// Book and tape agree on a direction
    Directional,
    /// Book and tape disagree
    Conflicted,
    /// Low volatility, no directional pressure
    Calm,
    Normal,
}

/// Latest merged feature vector for one symbol. Sub-readings stay None
/// until their analyzer has produced a value, and keep the previous value
/// across cycles where the analyzer declines to produce one.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureState {
    pub symbol: String,
    pub last_update_at: Option<DateTime<Utc>>,
    pub imbalance: Option<ImbalanceReading>,
    pub walls: Option<WallReading>,
    pub flow: Option<FlowReading>,
    pub volatility: Option<VolatilityReading>,
    pub fee_leverage: Option<FeeLeverageReading>,
    pub pump_signals: Option<PumpReading>,
    /// 0..1 weighted composite of volatility, spoofing and pump scores
    pub overall_risk_score: f64,
    pub market_condition: MarketCondition,
}

impl FeatureState {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            last_update_at: None,
            imbalance: None,
            walls: None,
            flow: None,
            volatility: None,
            fee_leverage: None,
            pump_signals: None,
            overall_risk_score: 0.0,
            market_condition: MarketCondition::Normal,
        }
    }

    /// Recompute the composite score and regime from whatever sub-readings
    /// are currently present. Missing readings contribute zero.
    pub fn recompute_composites(&mut self) {
        let vol_score = self
            .volatility
            .as_ref()
            .map(|v| v.volatility_score)
            .unwrap_or(0.0);
        let spoof_score = self
            .walls
            .as_ref()
            .map(|w| w.spoofing_score)
            .unwrap_or(0.0);
        let pump_score = self
            .pump_signals
            .as_ref()
            .map(|p| p.pump_likelihood)
            .unwrap_or(0.0);

        self.overall_risk_score =
            (0.40 * vol_score + 0.35 * spoof_score + 0.25 * pump_score).clamp(0.0, 1.0);
        self.market_condition = derive_market_condition(
            self.volatility.as_ref(),
            self.imbalance.as_ref(),
            self.flow.as_ref(),
        );
    }

    pub fn summary(&self) -> FeatureSummary {
        FeatureSummary {
            symbol: self.symbol.clone(),
            overall_risk_score: self.overall_risk_score,
            market_condition: self.market_condition,
            pump_likelihood: self
                .pump_signals
                .as_ref()
                .map(|p| p.pump_likelihood)
                .unwrap_or(0.0),
            volatility_score: self
                .volatility
                .as_ref()
                .map(|v| v.volatility_score)
                .unwrap_or(0.0),
            spoofing_score: self
                .walls
                .as_ref()
                .map(|w| w.spoofing_score)
                .unwrap_or(0.0),
            last_update_at: self.last_update_at,
        }
    }
}

/// Compact per-symbol line for the overview endpoint
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSummary {
    pub symbol: String,
    pub overall_risk_score: f64,
    pub market_condition: MarketCondition,
    pub pump_likelihood: f64,
    pub volatility_score: f64,
    pub spoofing_score: f64,
    pub last_update_at: Option<DateTime<Utc>>,
}

/// Regime rules, first match wins: explosive volatility, then book/tape
/// agreement, then calm, then normal
fn derive_market_condition(
    volatility: Option<&VolatilityReading>,
    imbalance: Option<&ImbalanceReading>,
    flow: Option<&FlowReading>,
) -> MarketCondition {
    if let Some(vol) = volatility {
        if vol.explosion || vol.risk_level == VolatilityRisk::Extreme {
            return MarketCondition::Explosive;
        }
    }

    if let (Some(imb), Some(flow)) = (imbalance, flow) {
        if imb.dominant_side != DominantSide::None && flow.dominant_side != DominantSide::None {
            return if imb.dominant_side == flow.dominant_side {
                MarketCondition::Directional
            } else {
                MarketCondition::Conflicted
            };
        }
    }

    if let Some(vol) = volatility {
        if matches!(vol.risk_level, VolatilityRisk::Low | VolatilityRisk::VeryLow) {
            return MarketCondition::Calm;
        }
    }

    MarketCondition::Normal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_volatility(risk: VolatilityRisk, score: f64, explosion: bool) -> VolatilityReading {
        VolatilityReading {
            atr_1s: 0.0,
            atr_5s: 0.0,
            atr_15s: 0.0,
            volatility_score: score,
            explosion,
            explosion_strength: 0.0,
            risk_level: risk,
        }
    }

    fn make_imbalance(side: DominantSide) -> ImbalanceReading {
        let mut reading = ImbalanceReading::empty();
        reading.dominant_side = side;
        reading
    }

    fn make_flow(side: DominantSide) -> FlowReading {
        let mut reading = FlowReading::empty();
        reading.dominant_side = side;
        reading
    }

    #[test]
    fn test_new_state_is_neutral() {
        let state = FeatureState::new("BTCUSDT");
        assert_eq!(state.overall_risk_score, 0.0);
        assert_eq!(state.market_condition, MarketCondition::Normal);
        assert!(state.last_update_at.is_none());
        assert!(state.volatility.is_none());
    }

    #[test]
    fn test_risk_score_weights() {
        let mut state = FeatureState::new("BTCUSDT");
        state.volatility = Some(make_volatility(VolatilityRisk::High, 1.0, false));
        state.recompute_composites();
        assert!((state.overall_risk_score - 0.40).abs() < 1e-9);

        let mut walls = crate::analyzers::WallReading::empty();
        walls.spoofing_score = 1.0;
        state.walls = Some(walls);
        state.recompute_composites();
        assert!((state.overall_risk_score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_explosive_takes_precedence() {
        let mut state = FeatureState::new("BTCUSDT");
        state.volatility = Some(make_volatility(VolatilityRisk::Extreme, 1.0, true));
        state.imbalance = Some(make_imbalance(DominantSide::Buy));
        state.flow = Some(make_flow(DominantSide::Buy));
        state.recompute_composites();
        assert_eq!(state.market_condition, MarketCondition::Explosive);
    }

    #[test]
    fn test_directional_when_sides_agree() {
        let mut state = FeatureState::new("BTCUSDT");
        state.volatility = Some(make_volatility(VolatilityRisk::Medium, 0.5, false));
        state.imbalance = Some(make_imbalance(DominantSide::Buy));
        state.flow = Some(make_flow(DominantSide::Buy));
        state.recompute_composites();
        assert_eq!(state.market_condition, MarketCondition::Directional);
    }

    #[test]
    fn test_conflicted_when_sides_disagree() {
        let mut state = FeatureState::new("BTCUSDT");
        state.imbalance = Some(make_imbalance(DominantSide::Buy));
        state.flow = Some(make_flow(DominantSide::Sell));
        state.recompute_composites();
        assert_eq!(state.market_condition, MarketCondition::Conflicted);
    }

    #[test]
    fn test_calm_when_quiet() {
        let mut state = FeatureState::new("BTCUSDT");
        state.volatility = Some(make_volatility(VolatilityRisk::VeryLow, 0.05, false));
        state.imbalance = Some(make_imbalance(DominantSide::None));
        state.flow = Some(make_flow(DominantSide::None));
        state.recompute_composites();
        assert_eq!(state.market_condition, MarketCondition::Calm);
    }

    #[test]
    fn test_summary_mirrors_state() {
        let mut state = FeatureState::new("ETHUSDT");
        state.volatility = Some(make_volatility(VolatilityRisk::Medium, 0.6, false));
        state.recompute_composites();
        let summary = state.summary();
        assert_eq!(summary.symbol, "ETHUSDT");
        assert_eq!(summary.volatility_score, 0.6);
        assert_eq!(summary.overall_risk_score, state.overall_risk_score);
    }
}
