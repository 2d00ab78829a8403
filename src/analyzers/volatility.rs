// Volatility Analyzer
// ATR per timeframe, normalized volatility score and explosion detection

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::core::config::VolatilityConfig;
use crate::core::types::{Candle, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolatilityRisk {
    VeryLow,
    Low,
    Medium,
    High,
    Extreme,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolatilityReading {
    pub atr_1s: f64,
    pub atr_5s: f64,
    pub atr_15s: f64,
    /// 0..1, current 5s ATR relative to its recent maximum
    pub volatility_score: f64,
    pub explosion: bool,
    /// Ratio of current 1s ATR to its rolling average; meaningful when
    /// explosion history exists
    pub explosion_strength: f64,
    pub risk_level: VolatilityRisk,
}

/// Stateful ATR tracker. Keeps a rolling history of ATR values per
/// timeframe to normalize the score and detect explosions.
pub struct VolatilityAnalyzer {
    config: VolatilityConfig,
    atr_history: HashMap<Timeframe, Vec<f64>>,
}

impl VolatilityAnalyzer {
    pub fn new(config: VolatilityConfig) -> Self {
        Self {
            config,
            atr_history: HashMap::new(),
        }
    }

    /// Returns None until at least one timeframe has two bars
    pub fn update(&mut self, candles: &HashMap<Timeframe, Vec<Candle>>) -> Option<VolatilityReading> {
        let has_enough = Timeframe::ALL
            .iter()
            .any(|tf| candles.get(tf).map(|c| c.len()).unwrap_or(0) >= 2);
        if !has_enough {
            return None;
        }

        let atr_1s = self.atr(candles.get(&Timeframe::S1));
        let atr_5s = self.atr(candles.get(&Timeframe::S5));
        let atr_15s = self.atr(candles.get(&Timeframe::S15));

        let volatility_score = self.score(atr_5s);
        let (explosion, explosion_strength) = self.detect_explosion(atr_1s);

        self.push_history(Timeframe::S1, atr_1s);
        self.push_history(Timeframe::S5, atr_5s);
        self.push_history(Timeframe::S15, atr_15s);

        let risk_level = if explosion || explosion_strength > self.config.extreme_strength {
            VolatilityRisk::Extreme
        } else if volatility_score >= 0.8 {
            VolatilityRisk::High
        } else if volatility_score >= 0.5 {
            VolatilityRisk::Medium
        } else if volatility_score >= 0.2 {
            VolatilityRisk::Low
        } else {
            VolatilityRisk::VeryLow
        };

        if explosion {
            debug!(atr_1s, explosion_strength, "Volatility explosion detected");
        }

        Some(VolatilityReading {
            atr_1s,
            atr_5s,
            atr_15s,
            volatility_score,
            explosion,
            explosion_strength,
            risk_level,
        })
    }

    /// Simple moving average of true ranges over the most recent bars.
    /// 0 when fewer than two bars exist.
    fn atr(&self, candles: Option<&Vec<Candle>>) -> f64 {
        let candles = match candles {
            Some(c) if c.len() >= 2 => c,
            _ => return 0.0,
        };

        let span = self.config.atr_period.min(candles.len() - 1);
        let start = candles.len() - span;
        let mut sum = 0.0;
        for i in start..candles.len() {
            sum += candles[i].true_range(candles[i - 1].close);
        }
        sum / span as f64
    }

    /// Current 5s ATR relative to the rolling maximum. Neutral 0.5 until
    /// enough history has accumulated.
    fn score(&self, atr_5s: f64) -> f64 {
        let history = match self.atr_history.get(&Timeframe::S5) {
            Some(h) if h.len() >= self.config.min_history_for_score => h,
            _ => return 0.5,
        };
        let max = history.iter().cloned().fold(atr_5s, f64::max);
        if max > 0.0 {
            (atr_5s / max).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn detect_explosion(&self, atr_1s: f64) -> (bool, f64) {
        let history = match self.atr_history.get(&Timeframe::S1) {
            Some(h) if h.len() >= self.config.min_history_for_score => h,
            _ => return (false, 0.0),
        };
        let span = self.config.explosion_samples.min(history.len());
        let avg: f64 = history[history.len() - span..].iter().sum::<f64>() / span as f64;
        if avg <= 0.0 {
            return (false, 0.0);
        }
        let ratio = atr_1s / avg;
        (ratio >= self.config.explosion_ratio, ratio)
    }

    fn push_history(&mut self, timeframe: Timeframe, atr: f64) {
        let history = self.atr_history.entry(timeframe).or_default();
        history.push(atr);
        if history.len() > self.config.rolling_window * 2 {
            let excess = history.len() - self.config.rolling_window;
            history.drain(..excess);
        }
    }
}
