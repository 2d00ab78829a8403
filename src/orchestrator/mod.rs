// Feature Orchestrator
// Per-symbol update loops with adaptive cadence and pull-based analyzers

pub mod state;

pub use state::{FeatureState, FeatureSummary, MarketCondition};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analyzers::{
    FeeLeverageAnalyzer, FlowDeltaEngine, OrderbookImbalanceAnalyzer, PumpSignalAnalyzer,
    VolatilityAnalyzer, WallSpoofingAnalyzer,
};
use crate::core::config::{CadenceConfig, FeatureConfig, OrchestratorConfig};
use crate::core::types::{now_ms, Candle, SymbolMeta, Timeframe};
use crate::market::{EventRateTracker, MarketDataSource};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("symbol universe is empty")]
    EmptyUniverse,
}

// ============================================================================
// Health reporting
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStatus {
    Healthy,
    Degraded,
    Idle,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub events_per_second: f64,
    /// Interval the cadence tiers currently select
    pub update_interval_ms: u64,
    pub total_updates: u64,
    /// Cycles where at least one analyzer had too little data
    pub degraded_results: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: PipelineStatus,
    /// Symbols updated within the staleness window
    pub active_symbols: usize,
    pub total_symbols: usize,
    pub performance: PerformanceMetrics,
}

// ============================================================================
// Cadence
// ============================================================================

/// Update interval for the current global event rate. Busier feeds update
/// less often per symbol so the total work stays bounded.
fn update_interval_for(events_per_second: f64, cadence: &CadenceConfig) -> Duration {
    let ms = if events_per_second >= cadence.saturated_eps {
        cadence.saturated_interval_ms
    } else if events_per_second >= cadence.busy_eps {
        cadence.busy_interval_ms
    } else if events_per_second >= cadence.moderate_eps {
        cadence.moderate_interval_ms
    } else {
        cadence.quiet_interval_ms
    };
    Duration::from_millis(ms)
}

/// Exponential backoff for symbols still waiting on first data
fn backoff_delay(attempts: u32, config: &OrchestratorConfig) -> Duration {
    let base = config.awaiting_data_backoff_base_secs;
    let capped = base
        .saturating_mul(1u64 << attempts.min(16))
        .min(config.awaiting_data_backoff_max_secs);
    Duration::from_secs(capped)
}

// ============================================================================
// Per-symbol worker
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum UpdatePhase {
    AwaitingData { attempts: u32 },
    Active,
}

enum CycleOutcome {
    NoData,
    Updated { degraded: bool },
}

/// Owns all stateful analyzers for one symbol. The orchestrator serializes
/// access, so each cycle sees the analyzers' state from the previous one.
struct SymbolWorker {
    symbol: String,
    phase: UpdatePhase,
    imbalance: OrderbookImbalanceAnalyzer,
    walls: WallSpoofingAnalyzer,
    flow: FlowDeltaEngine,
    volatility: VolatilityAnalyzer,
    pump: PumpSignalAnalyzer,
    fee_leverage: FeeLeverageAnalyzer,
}

impl SymbolWorker {
    fn new(symbol: &str, config: &FeatureConfig) -> Self {
        Self {
            symbol: symbol.to_string(),
            phase: UpdatePhase::AwaitingData { attempts: 0 },
            imbalance: OrderbookImbalanceAnalyzer::new(config.imbalance.clone()),
            walls: WallSpoofingAnalyzer::new(config.walls.clone()),
            flow: FlowDeltaEngine::new(config.flow.clone()),
            volatility: VolatilityAnalyzer::new(config.volatility.clone()),
            pump: PumpSignalAnalyzer::new(config.pump.clone()),
            fee_leverage: FeeLeverageAnalyzer::new(config.fee_leverage.clone()),
        }
    }

    /// One pull-and-analyze cycle. Analyzers that decline to produce a
    /// reading leave the previous value in place.
    async fn run_cycle(
        &mut self,
        source: &dyn MarketDataSource,
        config: &OrchestratorConfig,
        states: &RwLock<HashMap<String, FeatureState>>,
    ) -> CycleOutcome {
        let book = source.orderbook_summary(&self.symbol, config.orderbook_depth);
        let trades = source.recent_trades(&self.symbol, config.trade_fetch_limit);

        let book_usable = book.as_ref().map(|b| b.is_valid()).unwrap_or(false);
        if !book_usable && trades.is_empty() {
            return CycleOutcome::NoData;
        }

        let mut candles: HashMap<Timeframe, Vec<Candle>> = HashMap::new();
        for tf in Timeframe::ALL {
            let series = source.candles(&self.symbol, tf, config.candle_fetch_limit);
            if !series.is_empty() {
                candles.insert(tf, series);
            }
        }
        let meta = source
            .symbol_meta(&self.symbol)
            .unwrap_or_else(|| SymbolMeta::conservative(&self.symbol));

        let now = now_ms();
        let price = trades
            .last()
            .map(|t| t.price)
            .or_else(|| book.as_ref().and_then(|b| b.mid_price()))
            .unwrap_or(0.0);

        // Analyzers own disjoint state, so the fan-out can run concurrently
        let Self {
            imbalance,
            walls,
            flow,
            volatility,
            pump,
            fee_leverage,
            ..
        } = self;
        let book_ref = book.as_ref();
        let (imbalance_r, walls_r, flow_r, volatility_r, pump_r, fee_first_pass) = tokio::join!(
            async { book_ref.map(|b| imbalance.analyze(b)) },
            async { book_ref.map(|b| walls.update(b, &trades, price, now)) },
            async { Some(flow.update(&trades, now)) },
            async { volatility.update(&candles) },
            async { pump.update(price, &trades, book_ref, now) },
            async { fee_leverage.analyze(&meta, None, price) },
        );

        // Second pass once this cycle's volatility is known
        let fee_r = Some(match &volatility_r {
            Some(vol) => self.fee_leverage.analyze(&meta, Some(vol), price),
            None => fee_first_pass,
        });

        let degraded = volatility_r.is_none() || pump_r.is_none() || !book_usable;
        if degraded {
            debug!(
                symbol = %self.symbol,
                book = book_usable,
                volatility = volatility_r.is_some(),
                pump = pump_r.is_some(),
                "Cycle completed with partial inputs"
            );
        }

        let mut states = states.write();
        let state = states
            .entry(self.symbol.clone())
            .or_insert_with(|| FeatureState::new(&self.symbol));
        if let Some(r) = imbalance_r {
            state.imbalance = Some(r);
        }
        if let Some(r) = walls_r {
            state.walls = Some(r);
        }
        if let Some(r) = flow_r {
            state.flow = Some(r);
        }
        if let Some(r) = volatility_r {
            state.volatility = Some(r);
        }
        if let Some(r) = pump_r {
            state.pump_signals = Some(r);
        }
        if let Some(r) = fee_r {
            state.fee_leverage = Some(r);
        }
        state.last_update_at = Some(chrono::Utc::now());
        state.recompute_composites();

        CycleOutcome::Updated { degraded }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives one update loop per symbol over a shared data source. Cadence
/// adapts to the global event rate; symbols without data yet retry with
/// exponential backoff.
pub struct FeatureOrchestrator {
    config: Arc<FeatureConfig>,
    source: Arc<dyn MarketDataSource>,
    rate: Arc<EventRateTracker>,
    states: Arc<RwLock<HashMap<String, FeatureState>>>,
    workers: RwLock<HashMap<String, Arc<tokio::sync::Mutex<SymbolWorker>>>>,
    running: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    total_updates: Arc<AtomicU64>,
    degraded_results: Arc<AtomicU64>,
}

impl FeatureOrchestrator {
    pub fn new(
        config: FeatureConfig,
        source: Arc<dyn MarketDataSource>,
        rate: Arc<EventRateTracker>,
    ) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            config: Arc::new(config),
            source,
            rate,
            states: Arc::new(RwLock::new(HashMap::new())),
            workers: RwLock::new(HashMap::new()),
            running,
            handles: Mutex::new(Vec::new()),
            total_updates: Arc::new(AtomicU64::new(0)),
            degraded_results: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register symbols. Symbols added while the orchestrator is already
    /// running get their update loop spawned immediately.
    pub fn initialize(&self, symbols: &[String]) -> Result<(), OrchestratorError> {
        if symbols.is_empty() {
            return Err(OrchestratorError::EmptyUniverse);
        }

        let mut added: Vec<(String, Arc<tokio::sync::Mutex<SymbolWorker>>)> = Vec::new();
        {
            let mut workers = self.workers.write();
            let mut states = self.states.write();
            for symbol in symbols {
                if workers.contains_key(symbol) {
                    continue;
                }
                let worker = Arc::new(tokio::sync::Mutex::new(SymbolWorker::new(
                    symbol,
                    &self.config,
                )));
                workers.insert(symbol.clone(), Arc::clone(&worker));
                states
                    .entry(symbol.clone())
                    .or_insert_with(|| FeatureState::new(symbol));
                added.push((symbol.clone(), worker));
            }
        }

        if *self.running.borrow() && !added.is_empty() {
            let mut handles = self.handles.lock();
            for (symbol, worker) in &added {
                if self.source.has_data(symbol) {
                    if let Ok(mut guard) = worker.try_lock() {
                        guard.phase = UpdatePhase::Active;
                    }
                }
                handles.push(self.spawn_loop(symbol.clone(), Arc::clone(worker)));
            }
            info!(symbols = added.len(), "Late-registered symbols started");
        }

        info!(symbols = symbols.len(), "Feature orchestrator initialized");
        Ok(())
    }

    /// Spawn one update loop per registered symbol. Calling start while
    /// already running is a no-op.
    pub fn start(&self) {
        if *self.running.borrow() {
            warn!("Orchestrator already running");
            return;
        }
        self.running.send_replace(true);

        let mut handles = self.handles.lock();
        for (symbol, worker) in self.workers.read().iter() {
            // Symbols with data already buffered skip the backoff phase
            if self.source.has_data(symbol) {
                if let Ok(mut guard) = worker.try_lock() {
                    guard.phase = UpdatePhase::Active;
                }
            }

            handles.push(self.spawn_loop(symbol.clone(), Arc::clone(worker)));
        }

        info!(symbols = handles.len(), "Feature orchestrator started");
    }

    fn spawn_loop(
        &self,
        symbol: String,
        worker: Arc<tokio::sync::Mutex<SymbolWorker>>,
    ) -> JoinHandle<()> {
        let config = Arc::clone(&self.config);
        let source = Arc::clone(&self.source);
        let rate = Arc::clone(&self.rate);
        let states = Arc::clone(&self.states);
        let total_updates = Arc::clone(&self.total_updates);
        let degraded_results = Arc::clone(&self.degraded_results);
        let mut running = self.running.subscribe();

        tokio::spawn(async move {
            loop {
                if !*running.borrow() {
                    break;
                }

                let delay = {
                    let guard = worker.lock().await;
                    match guard.phase {
                        UpdatePhase::AwaitingData { attempts } => {
                            backoff_delay(attempts, &config.orchestrator)
                        }
                        UpdatePhase::Active => {
                            update_interval_for(
                                rate.events_per_second(),
                                &config.orchestrator.cadence,
                            )
                        }
                    }
                };

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = running.changed() => {
                        continue;
                    }
                }

                let mut guard = worker.lock().await;
                match guard
                    .run_cycle(source.as_ref(), &config.orchestrator, &states)
                    .await
                {
                    CycleOutcome::NoData => {
                        if let UpdatePhase::AwaitingData { attempts } = guard.phase {
                            guard.phase = UpdatePhase::AwaitingData {
                                attempts: attempts.saturating_add(1),
                            };
                            debug!(symbol = %symbol, attempts, "Still waiting for data");
                        } else {
                            guard.phase = UpdatePhase::AwaitingData { attempts: 0 };
                            warn!(symbol = %symbol, "Data source went quiet");
                        }
                    }
                    CycleOutcome::Updated { degraded } => {
                        if !matches!(guard.phase, UpdatePhase::Active) {
                            info!(symbol = %symbol, "First data received, loop active");
                            guard.phase = UpdatePhase::Active;
                        }
                        total_updates.fetch_add(1, Ordering::Relaxed);
                        if degraded {
                            degraded_results.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
            debug!(symbol = %symbol, "Update loop stopped");
        })
    }

    /// Run one update cycle for a symbol outside its loop schedule.
    /// Returns false when the symbol is unknown or has no data yet.
    pub async fn update_symbol(&self, symbol: &str) -> bool {
        let worker = match self.workers.read().get(symbol) {
            Some(w) => Arc::clone(w),
            None => return false,
        };
        let mut guard = worker.lock().await;
        match guard
            .run_cycle(self.source.as_ref(), &self.config.orchestrator, &self.states)
            .await
        {
            CycleOutcome::NoData => false,
            CycleOutcome::Updated { degraded } => {
                guard.phase = UpdatePhase::Active;
                self.total_updates.fetch_add(1, Ordering::Relaxed);
                if degraded {
                    self.degraded_results.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
        }
    }

    pub fn get_feature_state(&self, symbol: &str) -> Option<FeatureState> {
        self.states.read().get(symbol).cloned()
    }

    /// All symbol summaries, riskiest first
    pub fn get_features_overview(&self) -> Vec<FeatureSummary> {
        let mut overview: Vec<FeatureSummary> =
            self.states.read().values().map(|s| s.summary()).collect();
        overview.sort_by(|a, b| b.overall_risk_score.total_cmp(&a.overall_risk_score));
        overview
    }

    pub fn get_health_status(&self) -> HealthStatus {
        let states = self.states.read();
        let total_symbols = states.len();
        let stale_after = chrono::Duration::seconds(self.config.orchestrator.stale_after_secs);
        let now = chrono::Utc::now();
        let active_symbols = states
            .values()
            .filter(|s| {
                s.last_update_at
                    .map(|t| now - t <= stale_after)
                    .unwrap_or(false)
            })
            .count();
        drop(states);

        let running = *self.running.borrow();
        let status = if !running {
            PipelineStatus::Idle
        } else if total_symbols > 0 && active_symbols == total_symbols {
            PipelineStatus::Healthy
        } else {
            PipelineStatus::Degraded
        };

        let events_per_second = self.rate.events_per_second();
        HealthStatus {
            status,
            active_symbols,
            total_symbols,
            performance: PerformanceMetrics {
                events_per_second,
                update_interval_ms: update_interval_for(
                    events_per_second,
                    &self.config.orchestrator.cadence,
                )
                .as_millis() as u64,
                total_updates: self.total_updates.load(Ordering::Relaxed),
                degraded_results: self.degraded_results.load(Ordering::Relaxed),
            },
        }
    }

    /// Signal all loops to stop and wait for in-flight cycles to finish.
    /// Safe to call repeatedly.
    pub async fn stop(&self) {
        self.running.send_replace(false);
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Update loop panicked");
                }
            }
        }
        info!("Feature orchestrator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence_tiers() {
        let cadence = CadenceConfig::default();
        assert_eq!(update_interval_for(0.0, &cadence), Duration::from_millis(50));
        assert_eq!(update_interval_for(99.9, &cadence), Duration::from_millis(50));
        assert_eq!(update_interval_for(100.0, &cadence), Duration::from_millis(100));
        assert_eq!(update_interval_for(499.0, &cadence), Duration::from_millis(100));
        assert_eq!(update_interval_for(500.0, &cadence), Duration::from_millis(200));
        assert_eq!(update_interval_for(1500.0, &cadence), Duration::from_millis(300));
        assert_eq!(update_interval_for(1e9, &cadence), Duration::from_millis(300));
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let config = OrchestratorConfig::default();
        assert_eq!(backoff_delay(0, &config), Duration::from_secs(5));
        assert_eq!(backoff_delay(1, &config), Duration::from_secs(10));
        assert_eq!(backoff_delay(2, &config), Duration::from_secs(20));
        assert_eq!(backoff_delay(3, &config), Duration::from_secs(40));
        assert_eq!(backoff_delay(4, &config), Duration::from_secs(60));
        assert_eq!(backoff_delay(30, &config), Duration::from_secs(60));
    }
}
