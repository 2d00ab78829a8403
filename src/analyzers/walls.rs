// Wall and Spoofing Analyzer
// Large resting orders, their lifecycle, and manipulation heuristics

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::core::config::WallConfig;
use crate::core::types::{BookSide, OrderbookSnapshot, PriceLevel, Trade, TradeSide};

#[derive(Debug, Clone, Serialize)]
pub struct WallRecord {
    pub side: BookSide,
    pub price: f64,
    pub quantity: f64,
    pub usd_value: f64,
    /// Quantity relative to the side average, >= the wall multiplier
    pub strength: f64,
    pub distance_pct: f64,
    pub first_seen: i64,
    pub last_seen: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WallReading {
    pub bid_walls: Vec<WallRecord>,
    pub ask_walls: Vec<WallRecord>,
    /// 0..1; spoof events plus structural heuristics
    pub spoofing_score: f64,
    pub spoof_side: Option<BookSide>,
    pub recent_spoof_events: usize,
    /// Fraction of significant near-price trades that were aggressive buys
    pub absorption_buy: f64,
    pub absorption_sell: f64,
    /// Fraction of recently tracked walls still present, 0..1
    pub wall_persistence: f64,
}

impl WallReading {
    pub fn empty() -> Self {
        Self {
            bid_walls: Vec::new(),
            ask_walls: Vec::new(),
            spoofing_score: 0.0,
            spoof_side: None,
            recent_spoof_events: 0,
            absorption_buy: 0.0,
            absorption_sell: 0.0,
            wall_persistence: 0.0,
        }
    }
}

struct WallTrack {
    first_seen: i64,
    last_seen: i64,
    /// Closest the price has ever been to this wall, in percent
    min_distance_pct: f64,
}

/// Prices keyed at micro-precision so float noise does not split trackers
fn price_key(price: f64) -> i64 {
    (price * 1e6).round() as i64
}

/// Stateful wall tracker. Fed one orderbook pull at a time; remembers
/// wall lifecycles between pulls to classify disappearances.
pub struct WallSpoofingAnalyzer {
    config: WallConfig,
    trackers: HashMap<(BookSide, i64), WallTrack>,
    present_last_call: HashSet<(BookSide, i64)>,
    spoof_events: VecDeque<(i64, BookSide)>,
    snapshot_history: VecDeque<Vec<(BookSide, f64)>>,
}

impl WallSpoofingAnalyzer {
    pub fn new(config: WallConfig) -> Self {
        Self {
            config,
            trackers: HashMap::new(),
            present_last_call: HashSet::new(),
            spoof_events: VecDeque::new(),
            snapshot_history: VecDeque::new(),
        }
    }

    pub fn update(
        &mut self,
        book: &OrderbookSnapshot,
        trades: &[Trade],
        price: f64,
        now: i64,
    ) -> WallReading {
        let mid = match book.mid_price() {
            Some(m) if m > 0.0 => m,
            _ => return WallReading::empty(),
        };
        // Distances are measured from the traded price when one exists
        let reference = if price > 0.0 { price } else { mid };

        let bid_walls = self.detect_side(&book.bids, BookSide::Bid, reference, now);
        let ask_walls = self.detect_side(&book.asks, BookSide::Ask, reference, now);

        let current_keys: HashSet<(BookSide, i64)> = bid_walls
            .iter()
            .chain(ask_walls.iter())
            .map(|w| (w.side, price_key(w.price)))
            .collect();

        self.classify_disappearances(&current_keys, now);
        self.present_last_call = current_keys;

        // Evict stale trackers and expired spoof events
        let ttl_cutoff = now - self.config.tracker_ttl_ms;
        self.trackers.retain(|_, t| t.last_seen >= ttl_cutoff);
        let event_cutoff = now - self.config.spoof_event_window_ms;
        while let Some((ts, _)) = self.spoof_events.front() {
            if *ts < event_cutoff {
                self.spoof_events.pop_front();
            } else {
                break;
            }
        }

        let recent_spoof_events = self.spoof_events.len();
        let spoof_side = self.spoof_events.back().map(|(_, side)| *side);
        let spread_pct = book.spread_pct().unwrap_or(f64::MAX);
        let spoofing_score =
            self.spoofing_score(&bid_walls, &ask_walls, spread_pct, recent_spoof_events);

        let (absorption_buy, absorption_sell) = self.absorption(trades, price, now);
        let wall_persistence = self.persistence(&bid_walls, &ask_walls);

        if recent_spoof_events > 0 {
            debug!(
                symbol = %book.symbol,
                recent_spoof_events,
                spoofing_score,
                "Spoof activity present"
            );
        }

        WallReading {
            bid_walls,
            ask_walls,
            spoofing_score,
            spoof_side,
            recent_spoof_events,
            absorption_buy,
            absorption_sell,
            wall_persistence,
        }
    }

    /// Walls on one side: quantity at least multiplier x the side average,
    /// notional at least the USD floor, within the distance limit
    fn detect_side(
        &mut self,
        levels: &[PriceLevel],
        side: BookSide,
        reference: f64,
        now: i64,
    ) -> Vec<WallRecord> {
        let considered = &levels[..levels.len().min(self.config.levels_per_side)];
        if considered.is_empty() {
            return Vec::new();
        }
        let avg_qty: f64 =
            considered.iter().map(|l| l.quantity).sum::<f64>() / considered.len() as f64;
        if avg_qty <= 0.0 {
            return Vec::new();
        }

        let mut walls: Vec<WallRecord> = Vec::new();
        for level in considered {
            let distance_pct = (level.price - reference).abs() / reference * 100.0;
            let usd_value = level.notional_usd();
            if level.quantity < self.config.wall_multiplier * avg_qty
                || usd_value < self.config.min_wall_size_usd
                || distance_pct > self.config.max_distance_pct
            {
                continue;
            }

            let key = (side, price_key(level.price));
            let track = self.trackers.entry(key).or_insert(WallTrack {
                first_seen: now,
                last_seen: now,
                min_distance_pct: distance_pct,
            });
            track.last_seen = now;
            track.min_distance_pct = track.min_distance_pct.min(distance_pct);

            walls.push(WallRecord {
                side,
                price: level.price,
                quantity: level.quantity,
                usd_value,
                strength: level.quantity / avg_qty,
                distance_pct,
                first_seen: track.first_seen,
                last_seen: track.last_seen,
            });
        }

        walls.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        walls
    }

    /// A wall that lived past the minimum lifetime, was approached by the
    /// price, and then vanished counts as a spoof
    fn classify_disappearances(&mut self, current: &HashSet<(BookSide, i64)>, now: i64) {
        let gone: Vec<(BookSide, i64)> = self
            .present_last_call
            .difference(current)
            .copied()
            .collect();

        for key in gone {
            if let Some(track) = self.trackers.remove(&key) {
                let lifetime = now - track.first_seen;
                if lifetime >= self.config.spoof_min_lifetime_ms
                    && track.min_distance_pct < self.config.spoof_approach_pct
                {
                    self.spoof_events.push_back((now, key.0));
                }
            }
        }
    }

    fn spoofing_score(
        &self,
        bid_walls: &[WallRecord],
        ask_walls: &[WallRecord],
        spread_pct: f64,
        recent_events: usize,
    ) -> f64 {
        let mut score = 0.3 * recent_events as f64;

        // Walls pinning both sides of a tight spread
        if spread_pct < self.config.tight_spread_pct
            && !bid_walls.is_empty()
            && !ask_walls.is_empty()
        {
            score += 0.2;
        }

        // Layered walls stacked within a narrow band on the same side
        for walls in [bid_walls, ask_walls] {
            for pair in walls.windows(2) {
                let gap_pct = (pair[0].price - pair[1].price).abs() / pair[1].price * 100.0;
                if gap_pct <= self.config.layering_proximity_pct {
                    score += 0.1;
                }
            }
        }

        // A very strong wall with nothing opposing it
        let lone_strong = (ask_walls.is_empty()
            && bid_walls.iter().any(|w| w.strength > 5.0))
            || (bid_walls.is_empty() && ask_walls.iter().any(|w| w.strength > 5.0));
        if lone_strong {
            score += 0.15;
        }

        // Heavily lopsided top walls
        if let (Some(bid), Some(ask)) = (bid_walls.first(), ask_walls.first()) {
            let ratio = bid.usd_value.max(ask.usd_value) / bid.usd_value.min(ask.usd_value).max(1.0);
            if ratio > 5.0 {
                score += 0.1;
            }
        }

        score.min(1.0)
    }

    /// Share of significant recent trades executed near the current price,
    /// split by aggressor side
    fn absorption(&self, trades: &[Trade], price: f64, now: i64) -> (f64, f64) {
        if price <= 0.0 {
            return (0.0, 0.0);
        }
        let cutoff = now - self.config.absorption_window_ms;
        let min_notional = 0.1 * self.config.min_wall_size_usd;

        let mut significant = 0usize;
        let mut near_buy = 0usize;
        let mut near_sell = 0usize;
        for trade in trades {
            if trade.timestamp < cutoff || trade.notional_usd() <= min_notional {
                continue;
            }
            significant += 1;
            let dist_pct = (trade.price - price).abs() / price * 100.0;
            if dist_pct <= self.config.absorption_proximity_pct {
                match trade.aggressor_side() {
                    TradeSide::Buy => near_buy += 1,
                    TradeSide::Sell => near_sell += 1,
                }
            }
        }

        if significant == 0 {
            (0.0, 0.0)
        } else {
            (
                near_buy as f64 / significant as f64,
                near_sell as f64 / significant as f64,
            )
        }
    }

    /// Fraction of walls from recent pulls that are still present, matched
    /// by side and price within the tolerance
    fn persistence(&mut self, bid_walls: &[WallRecord], ask_walls: &[WallRecord]) -> f64 {
        let current: Vec<(BookSide, f64)> = bid_walls
            .iter()
            .chain(ask_walls.iter())
            .map(|w| (w.side, w.price))
            .collect();

        let mut total = 0usize;
        let mut matched = 0usize;
        for snapshot in &self.snapshot_history {
            for (side, price) in snapshot {
                total += 1;
                let still_there = current.iter().any(|(s, p)| {
                    s == side && (p - price).abs() / price * 100.0 <= self.config.persistence_tolerance_pct
                });
                if still_there {
                    matched += 1;
                }
            }
        }

        self.snapshot_history.push_back(current);
        if self.snapshot_history.len() > self.config.persistence_snapshots {
            self.snapshot_history.pop_front();
        }

        if total == 0 {
            0.0
        } else {
            matched as f64 / total as f64
        }
    }
}
