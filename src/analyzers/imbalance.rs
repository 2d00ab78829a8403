// Orderbook Imbalance Analyzer
// Top-of-book and zone-based bid/ask imbalance from a single snapshot

use serde::Serialize;

use crate::core::config::ImbalanceConfig;
use crate::core::types::{DominantSide, OrderbookSnapshot};

/// Signed imbalance per price zone relative to mid, range [-1, 1]
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ZoneImbalance {
    pub short_zone: f64,
    pub mid_zone: f64,
    pub far_zone: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImbalanceReading {
    /// (bidQty0 - askQty0) / (bidQty0 + askQty0)
    pub tob_imbalance: f64,
    pub zones: ZoneImbalance,
    pub dominant_side: DominantSide,
    /// 0..1; zone agreement, depth and spread quality combined
    pub confidence: f64,
    /// Total base quantity across both sides of the pulled book
    pub total_depth: f64,
    pub spread_pct: f64,
}

impl ImbalanceReading {
    /// Documented empty shape for missing/invalid books
    pub fn empty() -> Self {
        Self {
            tob_imbalance: 0.0,
            zones: ZoneImbalance::default(),
            dominant_side: DominantSide::None,
            confidence: 0.0,
            total_depth: 0.0,
            spread_pct: 0.0,
        }
    }
}

pub struct OrderbookImbalanceAnalyzer {
    config: ImbalanceConfig,
}

impl OrderbookImbalanceAnalyzer {
    pub fn new(config: ImbalanceConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, book: &OrderbookSnapshot) -> ImbalanceReading {
        let (best_bid, best_ask, mid) = match (book.best_bid(), book.best_ask(), book.mid_price())
        {
            (Some(b), Some(a), Some(m)) if m > 0.0 => (b, a, m),
            _ => return ImbalanceReading::empty(),
        };

        let tob_total = best_bid.quantity + best_ask.quantity;
        let tob_imbalance = if tob_total > 0.0 {
            (best_bid.quantity - best_ask.quantity) / tob_total
        } else {
            0.0
        };

        let cfg = &self.config;
        let zones = ZoneImbalance {
            short_zone: self.zone_ratio(book, mid, 0.0, cfg.zone_short_pct),
            mid_zone: self.zone_ratio(book, mid, cfg.zone_short_pct, cfg.zone_mid_pct),
            far_zone: self.zone_ratio(book, mid, cfg.zone_mid_pct, cfg.zone_far_pct),
        };

        let dominant_side = if tob_imbalance > cfg.dominance_threshold {
            DominantSide::Buy
        } else if tob_imbalance < -cfg.dominance_threshold {
            DominantSide::Sell
        } else {
            DominantSide::None
        };

        let total_depth: f64 = book
            .bids
            .iter()
            .chain(book.asks.iter())
            .map(|l| l.quantity)
            .sum();
        let spread_pct = book.spread_pct().unwrap_or(0.0);

        let confidence = self.confidence(tob_imbalance, &zones, total_depth, spread_pct);

        ImbalanceReading {
            tob_imbalance,
            zones,
            dominant_side,
            confidence,
            total_depth,
            spread_pct,
        }
    }

    /// Signed (bid - ask)/(bid + ask) volume ratio for levels whose distance
    /// from mid lies in (lower%, upper%]
    fn zone_ratio(&self, book: &OrderbookSnapshot, mid: f64, lower_pct: f64, upper_pct: f64) -> f64 {
        let in_zone = |price: f64| {
            let dist_pct = (price - mid).abs() / mid * 100.0;
            dist_pct > lower_pct && dist_pct <= upper_pct || (lower_pct == 0.0 && dist_pct == 0.0)
        };

        let bid_vol: f64 = book
            .bids
            .iter()
            .filter(|l| in_zone(l.price))
            .map(|l| l.quantity)
            .sum();
        let ask_vol: f64 = book
            .asks
            .iter()
            .filter(|l| in_zone(l.price))
            .map(|l| l.quantity)
            .sum();

        let total = bid_vol + ask_vol;
        if total > 0.0 {
            (bid_vol - ask_vol) / total
        } else {
            0.0
        }
    }

    fn confidence(
        &self,
        tob_imbalance: f64,
        zones: &ZoneImbalance,
        total_depth: f64,
        spread_pct: f64,
    ) -> f64 {
        // Fraction of zones whose direction agrees with top-of-book
        let agreement = if tob_imbalance == 0.0 {
            0.0
        } else {
            let sign = tob_imbalance.signum();
            let agreeing = [zones.short_zone, zones.mid_zone, zones.far_zone]
                .iter()
                .filter(|z| z.signum() == sign && **z != 0.0)
                .count();
            agreeing as f64 / 3.0
        };

        let depth_factor = (total_depth / self.config.depth_norm).min(1.0);
        let spread_quality = (1.0 - spread_pct / self.config.spread_quality_max_pct).clamp(0.0, 1.0);

        (0.4 * agreement + 0.3 * depth_factor + 0.3 * spread_quality).clamp(0.0, 1.0)
    }
}
