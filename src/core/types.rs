// Shared Market Data Types
// Narrow input surface consumed from the market-data collaborator

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current wall-clock time as epoch milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ============================================================================
// Orderbook
// ============================================================================

/// A single price level (price, quantity)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

impl PriceLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }

    pub fn notional_usd(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Book side (bid or ask)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookSide {
    Bid,
    Ask,
}

/// Top-N orderbook snapshot, bids and asks sorted best-first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    pub symbol: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub timestamp: i64,
}

impl OrderbookSnapshot {
    /// A snapshot is usable only when both sides have at least one level
    pub fn is_valid(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b.price + a.price) / 2.0),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some(a.price - b.price),
            _ => None,
        }
    }

    /// Spread as a percentage of the mid price
    pub fn spread_pct(&self) -> Option<f64> {
        match (self.spread(), self.mid_price()) {
            (Some(s), Some(m)) if m > 0.0 => Some(s / m * 100.0),
            _ => None,
        }
    }

    /// Total USD depth (both sides) within ±pct of the mid price
    pub fn depth_within_pct(&self, pct: f64) -> f64 {
        let mid = match self.mid_price() {
            Some(m) if m > 0.0 => m,
            _ => return 0.0,
        };

        let in_band = |level: &PriceLevel| {
            (level.price - mid).abs() / mid * 100.0 <= pct
        };

        self.bids
            .iter()
            .chain(self.asks.iter())
            .filter(|l| in_band(l))
            .map(|l| l.notional_usd())
            .sum()
    }
}

// ============================================================================
// Trades
// ============================================================================

/// Trade aggressor direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Dominant pressure side; `None` means no statistically significant side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DominantSide {
    Buy,
    Sell,
    #[default]
    None,
}

/// A single executed trade tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Trade {
    pub price: f64,
    pub quantity: f64,
    /// Binance convention: true means the buyer was the passive (maker) side,
    /// so the aggressor sold
    pub is_buyer_maker: bool,
    pub timestamp: i64,
}

impl Trade {
    pub fn aggressor_side(&self) -> TradeSide {
        if self.is_buyer_maker {
            TradeSide::Sell
        } else {
            TradeSide::Buy
        }
    }

    pub fn notional_usd(&self) -> f64 {
        self.price * self.quantity
    }
}

// ============================================================================
// Candles
// ============================================================================

/// Candle timeframes used by the feature pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    S1,
    S5,
    S15,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::S1, Timeframe::S5, Timeframe::S15];

    pub fn seconds(&self) -> u64 {
        match self {
            Timeframe::S1 => 1,
            Timeframe::S5 => 5,
            Timeframe::S15 => 15,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::S1 => "1s",
            Timeframe::S5 => "5s",
            Timeframe::S15 => "15s",
        }
    }
}

/// OHLCV bar
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: i64,
}

impl Candle {
    /// True range against the previous close
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

// ============================================================================
// Symbol metadata
// ============================================================================

/// Per-symbol exchange metadata used for fee/leverage derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolMeta {
    pub symbol: String,
    pub max_leverage: f64,
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub category: String,
    pub status: String,
}

impl SymbolMeta {
    /// Conservative fallback when the metadata source has no entry
    pub fn conservative(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            max_leverage: 1.0,
            maker_fee: 0.0002,
            taker_fee: 0.00055,
            category: "unknown".to_string(),
            status: "unknown".to_string(),
        }
    }
}
