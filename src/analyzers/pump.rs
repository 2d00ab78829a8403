// Pump Signal Analyzer
// Price acceleration, volume spikes, trade frequency and book thinning

use serde::Serialize;
use tracing::debug;

use crate::analyzers::window::TimeWindow;
use crate::core::config::PumpConfig;
use crate::core::types::{OrderbookSnapshot, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PumpRisk {
    Normal,
    Low,
    Moderate,
    High,
    Extreme,
}

#[derive(Debug, Clone, Serialize)]
pub struct PumpReading {
    /// Price changes as fractions (0.05 = 5%)
    pub price_change_5s: f64,
    pub price_change_15s: f64,
    pub price_change_60s: f64,
    /// Current 5s volume relative to its rolling baseline
    pub volume_spike_5s: f64,
    /// Trades per second over the last 5s
    pub trade_frequency: f64,
    /// 0..1, how much near-price depth has drained vs baseline
    pub orderbook_thinning: f64,
    /// 0..1 weighted composite
    pub pump_likelihood: f64,
    pub risk_level: PumpRisk,
}

/// Stateful pump detector. Builds its own rolling baselines for price,
/// volume and depth; returns None until the price history is deep enough.
pub struct PumpSignalAnalyzer {
    config: PumpConfig,
    price_history: TimeWindow<f64>,
    volume_baseline: TimeWindow<f64>,
    depth_baseline: TimeWindow<f64>,
}

impl PumpSignalAnalyzer {
    pub fn new(config: PumpConfig) -> Self {
        let window_ms = config.baseline_window_ms;
        Self {
            config,
            price_history: TimeWindow::new(window_ms, 600),
            volume_baseline: TimeWindow::new(window_ms, 120),
            depth_baseline: TimeWindow::new(window_ms, 120),
        }
    }

    pub fn update(
        &mut self,
        price: f64,
        trades: &[Trade],
        book: Option<&OrderbookSnapshot>,
        now: i64,
    ) -> Option<PumpReading> {
        if price <= 0.0 {
            return None;
        }
        self.price_history.prune(now);
        self.price_history.push(now, price);
        if self.price_history.len() < self.config.min_history_points {
            return None;
        }

        let price_change_5s = self.price_change(price, now, 5_000);
        let price_change_15s = self.price_change(price, now, 15_000);
        let price_change_60s = self.price_change(price, now, 60_000);

        let volume_spike_5s = self.volume_spike(trades, now);
        let trade_frequency = trades
            .iter()
            .filter(|t| t.timestamp >= now - 5_000)
            .count() as f64
            / 5.0;
        let orderbook_thinning = self.thinning(book, now);

        let cfg = &self.config;
        let price_term = (price_change_5s.abs() / cfg.price_change_cap).min(1.0);
        let volume_term = if volume_spike_5s > 1.0 {
            (volume_spike_5s.ln() / cfg.volume_spike_log_base.ln()).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let frequency_term = (trade_frequency / cfg.trade_frequency_cap).min(1.0);

        let pump_likelihood = (cfg.weight_price_change * price_term
            + cfg.weight_volume_spike * volume_term
            + cfg.weight_thinning * orderbook_thinning
            + cfg.weight_frequency * frequency_term)
            .clamp(0.0, 1.0);

        let abs_5s = price_change_5s.abs();
        let risk_level = if pump_likelihood > 0.8 || abs_5s > 0.15 || volume_spike_5s > 15.0 {
            PumpRisk::Extreme
        } else if pump_likelihood > 0.6 || abs_5s > 0.08 || volume_spike_5s > 8.0 {
            PumpRisk::High
        } else if pump_likelihood > 0.4 || abs_5s > 0.04 || volume_spike_5s > 4.0 {
            PumpRisk::Moderate
        } else if pump_likelihood > 0.2 {
            PumpRisk::Low
        } else {
            PumpRisk::Normal
        };

        if risk_level == PumpRisk::Extreme {
            debug!(pump_likelihood, price_change_5s, volume_spike_5s, "Extreme pump signal");
        }

        Some(PumpReading {
            price_change_5s,
            price_change_15s,
            price_change_60s,
            volume_spike_5s,
            trade_frequency,
            orderbook_thinning,
            pump_likelihood,
            risk_level,
        })
    }

    /// Fractional change vs the history sample closest to `lookback_ms` ago
    fn price_change(&self, price: f64, now: i64, lookback_ms: i64) -> f64 {
        match self.price_history.nearest(now - lookback_ms) {
            Some(past) if past.value > 0.0 => (price - past.value) / past.value,
            _ => 0.0,
        }
    }

    /// Current 5s volume vs the rolling average of previous 5s volumes.
    /// Neutral 1.0 until the baseline has a few samples.
    fn volume_spike(&mut self, trades: &[Trade], now: i64) -> f64 {
        let volume_5s: f64 = trades
            .iter()
            .filter(|t| t.timestamp >= now - 5_000)
            .map(|t| t.quantity)
            .sum();

        self.volume_baseline.prune(now);
        let spike = match self.volume_baseline.mean() {
            Some(avg) if self.volume_baseline.len() >= 3 && avg > 0.0 => volume_5s / avg,
            _ => 1.0,
        };
        self.volume_baseline.push(now, volume_5s);
        spike
    }

    /// Depth within the band around mid vs its rolling baseline
    fn thinning(&mut self, book: Option<&OrderbookSnapshot>, now: i64) -> f64 {
        let book = match book {
            Some(b) if b.is_valid() => b,
            _ => return 0.0,
        };
        let depth = book.depth_within_pct(self.config.depth_band_pct);

        self.depth_baseline.prune(now);
        let thinning = match self.depth_baseline.mean() {
            Some(avg) if self.depth_baseline.len() >= 3 && avg > 0.0 => {
                (1.0 - depth / avg).clamp(0.0, 1.0)
            }
            _ => 0.0,
        };
        self.depth_baseline.push(now, depth);
        thinning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> PumpSignalAnalyzer {
        PumpSignalAnalyzer::new(PumpConfig::default())
    }

    fn small_trade(ts: i64) -> Trade {
        Trade { price: 100.0, quantity: 0.1, is_buyer_maker: false, timestamp: ts }
    }

    #[test]
    fn test_insufficient_history_returns_none() {
        let mut analyzer = analyzer();
        for i in 0..9 {
            assert!(analyzer.update(100.0, &[], None, 1000 * (i + 1)).is_none());
        }
        // Tenth point reaches the minimum
        assert!(analyzer.update(100.0, &[], None, 10_000).is_some());
    }

    #[test]
    fn test_calm_market_is_normal() {
        let mut analyzer = analyzer();
        let mut last = None;
        for i in 0..15 {
            let now = 1000 * (i + 1);
            last = analyzer.update(100.0, &[small_trade(now - 500)], None, now);
        }
        let reading = last.unwrap();
        assert_eq!(reading.risk_level, PumpRisk::Normal);
        assert!(reading.pump_likelihood < 0.2);
        assert_eq!(reading.price_change_5s, 0.0);
    }

    #[test]
    fn test_extreme_pump_detected() {
        let mut analyzer = analyzer();
        // Flat warm-up with tiny volume
        for i in 0..12 {
            let now = 1000 * (i + 1);
            analyzer.update(100.0, &[small_trade(now - 500)], None, now);
        }

        // Sudden 16% move with a volume burst
        let now = 13_000;
        let burst: Vec<Trade> = (0..16)
            .map(|i| Trade {
                price: 116.0,
                quantity: 1.0,
                is_buyer_maker: false,
                timestamp: now - 100 * i,
            })
            .collect();
        let reading = analyzer.update(116.0, &burst, None, now).unwrap();

        assert!(reading.price_change_5s > 0.15);
        assert!(reading.volume_spike_5s > 15.0);
        assert_eq!(reading.risk_level, PumpRisk::Extreme);
        assert!(reading.pump_likelihood > 0.3);
    }

    #[test]
    fn test_price_change_uses_nearest_sample() {
        let mut analyzer = analyzer();
        for i in 0..10 {
            analyzer.update(100.0, &[], None, 1000 * (i + 1));
        }
        // 5s lookback from t=11000 lands on the t=6000 sample at price 100
        let reading = analyzer.update(110.0, &[], None, 11_000).unwrap();
        assert!((reading.price_change_5s - 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_likelihood_bounded() {
        let mut analyzer = analyzer();
        for i in 0..12 {
            analyzer.update(100.0, &[], None, 1000 * (i + 1));
        }
        let burst: Vec<Trade> = (0..500)
            .map(|i| Trade {
                price: 200.0,
                quantity: 100.0,
                is_buyer_maker: false,
                timestamp: 13_000 - i,
            })
            .collect();
        let reading = analyzer.update(200.0, &burst, None, 13_000).unwrap();
        assert!(reading.pump_likelihood <= 1.0);
        assert_eq!(reading.risk_level, PumpRisk::Extreme);
    }
}
