// Microstructure Store - in-memory per-symbol market data
// Ingestion side records raw events; the orchestrator pulls via MarketDataSource

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::core::types::{Candle, OrderbookSnapshot, SymbolMeta, Timeframe, Trade};
use crate::market::rate::EventRateTracker;

/// Narrow read interface the feature pipeline consumes. Exchange
/// connectivity lives behind an implementation of this trait.
pub trait MarketDataSource: Send + Sync {
    fn orderbook_summary(&self, symbol: &str, depth: usize) -> Option<OrderbookSnapshot>;
    fn recent_trades(&self, symbol: &str, limit: usize) -> Vec<Trade>;
    fn candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Vec<Candle>;
    fn symbol_meta(&self, symbol: &str) -> Option<SymbolMeta>;

    /// True once the store holds an orderbook or at least one trade
    fn has_data(&self, symbol: &str) -> bool {
        self.orderbook_summary(symbol, 1).is_some() || !self.recent_trades(symbol, 1).is_empty()
    }
}

#[derive(Default)]
struct SymbolData {
    orderbook: Option<OrderbookSnapshot>,
    trades: VecDeque<Trade>,
    candles: HashMap<Timeframe, VecDeque<Candle>>,
    meta: Option<SymbolMeta>,
}

/// Statistics snapshot from the store
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub symbol_count: usize,
    pub total_events: u64,
    pub events_per_second: f64,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Store(symbols={}, events={}, eps={:.1})",
            self.symbol_count, self.total_events, self.events_per_second
        )
    }
}

/// Thread-safe in-memory market data store. Writers are the ingestion
/// callbacks (one per stream); readers are the per-symbol update loops.
pub struct MicrostructureStore {
    symbols: RwLock<HashMap<String, SymbolData>>,
    rate: Arc<EventRateTracker>,
    max_trades: usize,
    max_candles: usize,
}

impl MicrostructureStore {
    pub fn new(rate: Arc<EventRateTracker>) -> Self {
        Self {
            symbols: RwLock::new(HashMap::new()),
            rate,
            max_trades: 1000,
            max_candles: 200,
        }
    }

    pub fn record_orderbook(&self, snapshot: OrderbookSnapshot) {
        let mut symbols = self.symbols.write();
        let entry = symbols.entry(snapshot.symbol.clone()).or_default();
        entry.orderbook = Some(snapshot);
        drop(symbols);
        self.rate.record_event();
    }

    pub fn record_trade(&self, symbol: &str, trade: Trade) {
        let mut symbols = self.symbols.write();
        let entry = symbols.entry(symbol.to_string()).or_default();
        entry.trades.push_back(trade);
        if entry.trades.len() > self.max_trades {
            entry.trades.pop_front();
        }
        drop(symbols);
        self.rate.record_event();
    }

    pub fn record_candle(&self, symbol: &str, timeframe: Timeframe, candle: Candle) {
        let mut symbols = self.symbols.write();
        let entry = symbols.entry(symbol.to_string()).or_default();
        let series = entry.candles.entry(timeframe).or_default();

        // Same-timestamp bar replaces the open bar instead of appending
        match series.back_mut() {
            Some(last) if last.timestamp == candle.timestamp => *last = candle,
            _ => {
                series.push_back(candle);
                if series.len() > self.max_candles {
                    series.pop_front();
                }
            }
        }
        drop(symbols);
        self.rate.record_event();
    }

    pub fn set_symbol_meta(&self, meta: SymbolMeta) {
        let mut symbols = self.symbols.write();
        let entry = symbols.entry(meta.symbol.clone()).or_default();
        entry.meta = Some(meta);
    }

    pub fn get_stats(&self) -> StoreStats {
        StoreStats {
            symbol_count: self.symbols.read().len(),
            total_events: self.rate.total_events(),
            events_per_second: self.rate.events_per_second(),
        }
    }
}

impl MarketDataSource for MicrostructureStore {
    fn orderbook_summary(&self, symbol: &str, depth: usize) -> Option<OrderbookSnapshot> {
        let symbols = self.symbols.read();
        let book = symbols.get(symbol)?.orderbook.as_ref()?;
        Some(OrderbookSnapshot {
            symbol: book.symbol.clone(),
            bids: book.bids.iter().take(depth).copied().collect(),
            asks: book.asks.iter().take(depth).copied().collect(),
            timestamp: book.timestamp,
        })
    }

    fn recent_trades(&self, symbol: &str, limit: usize) -> Vec<Trade> {
        let symbols = self.symbols.read();
        match symbols.get(symbol) {
            Some(data) => {
                let skip = data.trades.len().saturating_sub(limit);
                data.trades.iter().skip(skip).copied().collect()
            }
            None => Vec::new(),
        }
    }

    fn candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Vec<Candle> {
        let symbols = self.symbols.read();
        match symbols.get(symbol).and_then(|d| d.candles.get(&timeframe)) {
            Some(series) => {
                let skip = series.len().saturating_sub(limit);
                series.iter().skip(skip).copied().collect()
            }
            None => Vec::new(),
        }
    }

    fn symbol_meta(&self, symbol: &str) -> Option<SymbolMeta> {
        self.symbols.read().get(symbol).and_then(|d| d.meta.clone())
    }
}
