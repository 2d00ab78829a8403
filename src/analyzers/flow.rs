// Trade Flow Delta Engine
// Windowed buy/sell volume, dominance streaks, consistency and acceleration

use serde::Serialize;
use tracing::trace;

use crate::analyzers::window::TimeWindow;
use crate::core::config::FlowConfig;
use crate::core::types::{DominantSide, Trade, TradeSide};

/// Aggregated flow for one time window
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WindowFlow {
    pub buy_volume: f64,
    pub sell_volume: f64,
    /// (buy - sell) / (buy + sell), range [-1, 1]
    pub delta_ratio: f64,
    pub trade_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowReading {
    pub flow_1s: WindowFlow,
    pub flow_5s: WindowFlow,
    pub flow_15s: WindowFlow,
    pub dominant_side: DominantSide,
    /// Duration of the current dominance streak; 0 until it reaches the
    /// minimum streak length
    pub streak_ms: i64,
    /// Fraction of windows agreeing on direction, 0..1
    pub flow_consistency: f64,
    /// Relative change of the last two 5s volume buckets vs the prior two,
    /// clamped to [-2, 2]
    pub volume_acceleration: f64,
}

impl FlowReading {
    pub fn empty() -> Self {
        Self {
            flow_1s: WindowFlow::default(),
            flow_5s: WindowFlow::default(),
            flow_15s: WindowFlow::default(),
            dominant_side: DominantSide::None,
            streak_ms: 0,
            flow_consistency: 0.0,
            volume_acceleration: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FlowSample {
    side: TradeSide,
    quantity: f64,
}

/// Short rolling buffers of trades per fixed window (1s/5s/15s)
struct WindowedTradeAggregator {
    window_1s: TimeWindow<FlowSample>,
    window_5s: TimeWindow<FlowSample>,
    window_15s: TimeWindow<FlowSample>,
}

impl WindowedTradeAggregator {
    fn new(config: &FlowConfig) -> Self {
        Self {
            window_1s: TimeWindow::new(1_000, config.capacity_1s),
            window_5s: TimeWindow::new(5_000, config.capacity_5s),
            window_15s: TimeWindow::new(15_000, config.capacity_15s),
        }
    }

    fn ingest(&mut self, trade: &Trade) {
        let sample = FlowSample {
            side: trade.aggressor_side(),
            quantity: trade.quantity,
        };
        self.window_1s.push(trade.timestamp, sample);
        self.window_5s.push(trade.timestamp, sample);
        self.window_15s.push(trade.timestamp, sample);
    }

    fn aggregate(&mut self, now: i64) -> (WindowFlow, WindowFlow, WindowFlow) {
        self.window_1s.prune(now);
        self.window_5s.prune(now);
        self.window_15s.prune(now);
        (
            Self::fold(&self.window_1s),
            Self::fold(&self.window_5s),
            Self::fold(&self.window_15s),
        )
    }

    fn fold(window: &TimeWindow<FlowSample>) -> WindowFlow {
        let mut flow = WindowFlow::default();
        for sample in window.iter() {
            match sample.value.side {
                TradeSide::Buy => flow.buy_volume += sample.value.quantity,
                TradeSide::Sell => flow.sell_volume += sample.value.quantity,
            }
            flow.trade_count += 1;
        }
        let total = flow.buy_volume + flow.sell_volume;
        if total > 0.0 {
            flow.delta_ratio = (flow.buy_volume - flow.sell_volume) / total;
        }
        flow
    }
}

/// Stateful per-symbol flow engine. Re-fed from overlapping `recent_trades`
/// pulls; already-ingested trades are skipped by timestamp.
pub struct FlowDeltaEngine {
    config: FlowConfig,
    aggregator: WindowedTradeAggregator,
    last_ingested_ts: i64,

    // 5s volume buckets for acceleration, keyed by bucket start
    bucket_volumes: std::collections::VecDeque<(i64, f64)>,

    streak_side: DominantSide,
    streak_start_ms: i64,
}

impl FlowDeltaEngine {
    pub fn new(config: FlowConfig) -> Self {
        let aggregator = WindowedTradeAggregator::new(&config);
        Self {
            config,
            aggregator,
            last_ingested_ts: 0,
            bucket_volumes: std::collections::VecDeque::with_capacity(8),
            streak_side: DominantSide::None,
            streak_start_ms: 0,
        }
    }

    pub fn update(&mut self, trades: &[Trade], now: i64) -> FlowReading {
        // Dedup against the previous pull only, so same-millisecond trades
        // within one batch are all ingested
        let cutoff = self.last_ingested_ts;
        let mut newest = cutoff;
        for trade in trades {
            if trade.timestamp <= cutoff {
                continue;
            }
            self.aggregator.ingest(trade);
            self.record_bucket_volume(trade);
            newest = newest.max(trade.timestamp);
        }
        self.last_ingested_ts = newest;

        let (flow_1s, flow_5s, flow_15s) = self.aggregator.aggregate(now);

        let dominant_side = if flow_5s.delta_ratio > self.config.dominance_threshold {
            DominantSide::Buy
        } else if flow_5s.delta_ratio < -self.config.dominance_threshold {
            DominantSide::Sell
        } else {
            DominantSide::None
        };

        let streak_ms = self.track_streak(dominant_side, now);
        let flow_consistency = self.consistency(&[flow_1s, flow_5s, flow_15s]);
        let volume_acceleration = self.acceleration();

        trace!(
            delta_5s = flow_5s.delta_ratio,
            side = ?dominant_side,
            streak_ms,
            "Flow updated"
        );

        FlowReading {
            flow_1s,
            flow_5s,
            flow_15s,
            dominant_side,
            streak_ms,
            flow_consistency,
            volume_acceleration,
        }
    }

    fn record_bucket_volume(&mut self, trade: &Trade) {
        let bucket = trade.timestamp - trade.timestamp.rem_euclid(5000);
        match self.bucket_volumes.back_mut() {
            Some((start, vol)) if *start == bucket => *vol += trade.quantity,
            _ => {
                self.bucket_volumes.push_back((bucket, trade.quantity));
                if self.bucket_volumes.len() > 8 {
                    self.bucket_volumes.pop_front();
                }
            }
        }
    }

    /// Consecutive calls with the same dominant side accumulate a streak;
    /// streaks below the minimum report 0
    fn track_streak(&mut self, side: DominantSide, now: i64) -> i64 {
        if side == DominantSide::None {
            self.streak_side = DominantSide::None;
            self.streak_start_ms = 0;
            return 0;
        }

        if side != self.streak_side {
            self.streak_side = side;
            self.streak_start_ms = now;
        }

        let duration = now - self.streak_start_ms;
        if duration >= self.config.min_streak_ms {
            duration
        } else {
            0
        }
    }

    /// Fraction of windows whose ratio exceeds the consistency threshold
    /// and points in the majority direction
    fn consistency(&self, flows: &[WindowFlow; 3]) -> f64 {
        let threshold = self.config.consistency_threshold;
        let positive = flows.iter().filter(|f| f.delta_ratio > threshold).count();
        let negative = flows.iter().filter(|f| f.delta_ratio < -threshold).count();
        positive.max(negative) as f64 / 3.0
    }

    fn acceleration(&self) -> f64 {
        if self.bucket_volumes.len() < 4 {
            return 0.0;
        }
        let n = self.bucket_volumes.len();
        let recent: f64 = self
            .bucket_volumes
            .iter()
            .skip(n - 2)
            .map(|(_, v)| v)
            .sum();
        let prior: f64 = self
            .bucket_volumes
            .iter()
            .skip(n - 4)
            .take(2)
            .map(|(_, v)| v)
            .sum();
        if prior <= 0.0 {
            return 0.0;
        }
        ((recent - prior) / prior).clamp(-2.0, 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FlowDeltaEngine {
        FlowDeltaEngine::new(FlowConfig::default())
    }

    fn trade(ts: i64, qty: f64, buy: bool) -> Trade {
        Trade { price: 100.0, quantity: qty, is_buyer_maker: !buy, timestamp: ts }
    }

    #[test]
    fn test_empty_input_idempotent() {
        let mut engine = engine();
        for _ in 0..3 {
            let reading = engine.update(&[], 10_000);
            assert_eq!(reading.dominant_side, DominantSide::None);
            assert_eq!(reading.flow_5s.delta_ratio, 0.0);
            assert_eq!(reading.streak_ms, 0);
            assert_eq!(reading.volume_acceleration, 0.0);
        }
    }

    #[test]
    fn test_delta_ratio_and_dominance() {
        let mut engine = engine();
        let trades = vec![
            trade(9000, 8.0, true),
            trade(9100, 2.0, false),
        ];
        let reading = engine.update(&trades, 10_000);
        // (8 - 2) / 10 = 0.6 in every window containing both trades
        assert!((reading.flow_5s.delta_ratio - 0.6).abs() < 1e-9);
        assert_eq!(reading.dominant_side, DominantSide::Buy);
        assert_eq!(reading.flow_5s.trade_count, 2);
    }

    #[test]
    fn test_window_eviction() {
        let mut engine = engine();
        engine.update(&[trade(1000, 5.0, true)], 1000);
        // 10s later the trade is out of the 1s and 5s windows, still in 15s
        let reading = engine.update(&[], 11_000);
        assert_eq!(reading.flow_1s.trade_count, 0);
        assert_eq!(reading.flow_5s.trade_count, 0);
        assert_eq!(reading.flow_15s.trade_count, 1);
    }

    #[test]
    fn test_overlapping_pulls_deduplicated() {
        let mut engine = engine();
        let trades = vec![trade(9000, 4.0, true), trade(9500, 4.0, true)];
        engine.update(&trades, 10_000);
        // The same list again must not double-count
        let reading = engine.update(&trades, 10_100);
        assert!((reading.flow_5s.buy_volume - 8.0).abs() < 1e-9);
        assert_eq!(reading.flow_5s.trade_count, 2);
    }

    #[test]
    fn test_same_timestamp_trades_all_ingested() {
        let mut engine = engine();
        let trades = vec![trade(9000, 4.0, true), trade(9000, 4.0, true)];
        let reading = engine.update(&trades, 10_000);
        assert_eq!(reading.flow_5s.trade_count, 2);
        assert!((reading.flow_5s.buy_volume - 8.0).abs() < 1e-9);

        // Re-feeding the same batch later still deduplicates
        let reading = engine.update(&trades, 10_100);
        assert_eq!(reading.flow_5s.trade_count, 2);
        assert!((reading.flow_5s.buy_volume - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_streak_suppressed() {
        let mut engine = engine();
        let reading = engine.update(&[trade(900, 10.0, true)], 1000);
        assert_eq!(reading.dominant_side, DominantSide::Buy);
        // First observation: streak just started, below 3s minimum
        assert_eq!(reading.streak_ms, 0);

        let reading = engine.update(&[trade(2900, 10.0, true)], 3000);
        // 2s of buy dominance, still suppressed
        assert_eq!(reading.streak_ms, 0);
    }

    #[test]
    fn test_streak_reported_after_minimum() {
        let mut engine = engine();
        engine.update(&[trade(900, 10.0, true)], 1000);
        let reading = engine.update(&[trade(4400, 10.0, true)], 4500);
        assert_eq!(reading.dominant_side, DominantSide::Buy);
        assert_eq!(reading.streak_ms, 3500);
    }

    #[test]
    fn test_streak_resets_on_side_flip() {
        let mut engine = engine();
        engine.update(&[trade(900, 10.0, true)], 1000);
        engine.update(&[trade(4400, 10.0, true)], 4500);
        // Heavy selling flips the 5s window
        let reading = engine.update(&[trade(4900, 100.0, false)], 5000);
        assert_eq!(reading.dominant_side, DominantSide::Sell);
        assert_eq!(reading.streak_ms, 0);
    }

    #[test]
    fn test_consistency_full_agreement() {
        let mut engine = engine();
        let trades = vec![trade(9800, 10.0, true), trade(9900, 10.0, true)];
        let reading = engine.update(&trades, 10_000);
        assert!((reading.flow_consistency - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_volume_acceleration_clamped() {
        let mut engine = engine();
        // Four 5s buckets: 1, 1, then a large burst in the last two
        let mut trades = vec![
            trade(1_000, 1.0, true),
            trade(6_000, 1.0, true),
            trade(11_000, 50.0, true),
            trade(16_000, 50.0, true),
        ];
        trades.sort_by_key(|t| t.timestamp);
        let reading = engine.update(&trades, 16_500);
        assert_eq!(reading.volume_acceleration, 2.0);
    }
}
