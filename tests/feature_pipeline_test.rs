// Feature pipeline integration tests
// Store -> orchestrator -> feature state, over the public API

use std::sync::Arc;
use std::time::Duration;

use market_pulse::core::types::{now_ms, Candle, PriceLevel, Timeframe, Trade};
use market_pulse::{
    EventRateTracker, FeatureConfig, FeatureOrchestrator, MarketCondition, MicrostructureStore,
    OrderbookSnapshot, PipelineStatus, SymbolMeta,
};

// ============================================================================
// Fixtures
// ============================================================================

fn make_orchestrator(store: Arc<MicrostructureStore>, rate: Arc<EventRateTracker>) -> FeatureOrchestrator {
    FeatureOrchestrator::new(FeatureConfig::default(), store, rate)
}

fn make_book(symbol: &str, ts: i64) -> OrderbookSnapshot {
    OrderbookSnapshot {
        symbol: symbol.to_string(),
        bids: vec![
            PriceLevel::new(100.0, 10.0),
            PriceLevel::new(99.9, 8.0),
            PriceLevel::new(99.8, 6.0),
        ],
        asks: vec![
            PriceLevel::new(100.1, 3.0),
            PriceLevel::new(100.2, 4.0),
            PriceLevel::new(100.3, 5.0),
        ],
        timestamp: ts,
    }
}

fn make_candle(ts: i64) -> Candle {
    Candle {
        open: 100.0,
        high: 100.5,
        low: 99.5,
        close: 100.2,
        volume: 12.0,
        timestamp: ts,
    }
}

/// Populate a symbol with a book, a burst of trades, candles and metadata
fn seed_symbol(store: &MicrostructureStore, symbol: &str) {
    let now = now_ms();
    store.record_orderbook(make_book(symbol, now));
    for i in 0..20 {
        store.record_trade(
            symbol,
            Trade {
                price: 100.0 + (i as f64) * 0.01,
                quantity: 0.5,
                is_buyer_maker: i % 3 == 0,
                timestamp: now - 4_000 + i * 200,
            },
        );
    }
    for i in 0..20 {
        store.record_candle(symbol, Timeframe::S1, make_candle(now - (20 - i) * 1_000));
        store.record_candle(symbol, Timeframe::S5, make_candle(now - (20 - i) * 5_000));
    }
    store.set_symbol_meta(SymbolMeta {
        symbol: symbol.to_string(),
        max_leverage: 20.0,
        maker_fee: 0.0002,
        taker_fee: 0.00055,
        category: "linear".to_string(),
        status: "Trading".to_string(),
    });
}

// ============================================================================
// Initialization
// ============================================================================

#[tokio::test]
async fn test_initialize_rejects_empty_universe() {
    let rate = Arc::new(EventRateTracker::new());
    let store = Arc::new(MicrostructureStore::new(Arc::clone(&rate)));
    let orchestrator = make_orchestrator(store, rate);

    assert!(orchestrator.initialize(&[]).is_err());
    assert!(orchestrator.initialize(&["BTCUSDT".to_string()]).is_ok());
}

#[tokio::test]
async fn test_unknown_symbol_lookups() {
    let rate = Arc::new(EventRateTracker::new());
    let store = Arc::new(MicrostructureStore::new(Arc::clone(&rate)));
    let orchestrator = make_orchestrator(store, rate);
    orchestrator.initialize(&["BTCUSDT".to_string()]).unwrap();

    assert!(orchestrator.get_feature_state("DOGEUSDT").is_none());
    assert!(!orchestrator.update_symbol("DOGEUSDT").await);
}

// ============================================================================
// Manual update cycle
// ============================================================================

#[tokio::test]
async fn test_update_without_data_reports_no_data() {
    let rate = Arc::new(EventRateTracker::new());
    let store = Arc::new(MicrostructureStore::new(Arc::clone(&rate)));
    let orchestrator = make_orchestrator(store, rate);
    orchestrator.initialize(&["BTCUSDT".to_string()]).unwrap();

    assert!(!orchestrator.update_symbol("BTCUSDT").await);

    // The registered state exists but carries no readings
    let state = orchestrator.get_feature_state("BTCUSDT").unwrap();
    assert!(state.last_update_at.is_none());
    assert!(state.imbalance.is_none());
}

#[tokio::test]
async fn test_update_populates_feature_state() {
    let rate = Arc::new(EventRateTracker::new());
    let store = Arc::new(MicrostructureStore::new(Arc::clone(&rate)));
    seed_symbol(&store, "BTCUSDT");
    let orchestrator = make_orchestrator(Arc::clone(&store), rate);
    orchestrator.initialize(&["BTCUSDT".to_string()]).unwrap();

    assert!(orchestrator.update_symbol("BTCUSDT").await);

    let state = orchestrator.get_feature_state("BTCUSDT").unwrap();
    assert!(state.last_update_at.is_some());

    let imbalance = state.imbalance.expect("book present, imbalance expected");
    assert!(imbalance.tob_imbalance > 0.0);

    let flow = state.flow.expect("trades present, flow expected");
    assert!(flow.flow_15s.trade_count > 0);

    let volatility = state.volatility.expect("candles present, volatility expected");
    assert!(volatility.atr_1s >= 0.0);

    let fees = state.fee_leverage.expect("fee reading always produced");
    assert!(fees.default_leverage >= 1);
    assert_eq!(fees.max_leverage, 20.0);

    assert!(state.walls.is_some());
    assert!((0.0..=1.0).contains(&state.overall_risk_score));
}

#[tokio::test]
async fn test_repeated_updates_keep_state_consistent() {
    let rate = Arc::new(EventRateTracker::new());
    let store = Arc::new(MicrostructureStore::new(Arc::clone(&rate)));
    seed_symbol(&store, "BTCUSDT");
    let orchestrator = make_orchestrator(Arc::clone(&store), rate);
    orchestrator.initialize(&["BTCUSDT".to_string()]).unwrap();

    for _ in 0..5 {
        assert!(orchestrator.update_symbol("BTCUSDT").await);
    }

    let state = orchestrator.get_feature_state("BTCUSDT").unwrap();
    assert!((0.0..=1.0).contains(&state.overall_risk_score));
    // A seeded calm book never classifies as explosive
    assert_ne!(state.market_condition, MarketCondition::Explosive);
}

// ============================================================================
// Overview and health
// ============================================================================

#[tokio::test]
async fn test_overview_sorted_by_risk() {
    let rate = Arc::new(EventRateTracker::new());
    let store = Arc::new(MicrostructureStore::new(Arc::clone(&rate)));
    seed_symbol(&store, "BTCUSDT");
    seed_symbol(&store, "ETHUSDT");
    let orchestrator = make_orchestrator(Arc::clone(&store), rate);
    orchestrator
        .initialize(&["BTCUSDT".to_string(), "ETHUSDT".to_string(), "SOLUSDT".to_string()])
        .unwrap();

    orchestrator.update_symbol("BTCUSDT").await;
    orchestrator.update_symbol("ETHUSDT").await;

    let overview = orchestrator.get_features_overview();
    assert_eq!(overview.len(), 3);
    for pair in overview.windows(2) {
        assert!(pair[0].overall_risk_score >= pair[1].overall_risk_score);
    }
    // The never-updated symbol sits at the bottom with zero risk
    assert_eq!(overview.last().unwrap().overall_risk_score, 0.0);
}

#[tokio::test]
async fn test_health_status_transitions() {
    let rate = Arc::new(EventRateTracker::new());
    let store = Arc::new(MicrostructureStore::new(Arc::clone(&rate)));
    seed_symbol(&store, "BTCUSDT");
    let orchestrator = make_orchestrator(Arc::clone(&store), rate);
    orchestrator
        .initialize(&["BTCUSDT".to_string(), "ETHUSDT".to_string()])
        .unwrap();

    // Not started yet
    let health = orchestrator.get_health_status();
    assert_eq!(health.status, PipelineStatus::Idle);
    assert_eq!(health.total_symbols, 2);
    assert_eq!(health.active_symbols, 0);

    orchestrator.start();
    orchestrator.update_symbol("BTCUSDT").await;

    // One of two symbols fresh: running but degraded
    let health = orchestrator.get_health_status();
    assert_eq!(health.status, PipelineStatus::Degraded);
    assert_eq!(health.active_symbols, 1);
    assert!(health.performance.total_updates >= 1);

    orchestrator.stop().await;
    assert_eq!(orchestrator.get_health_status().status, PipelineStatus::Idle);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_start_stop_lifecycle() {
    let rate = Arc::new(EventRateTracker::new());
    let store = Arc::new(MicrostructureStore::new(Arc::clone(&rate)));
    seed_symbol(&store, "BTCUSDT");
    let orchestrator = make_orchestrator(Arc::clone(&store), rate);
    orchestrator.initialize(&["BTCUSDT".to_string()]).unwrap();

    orchestrator.start();
    // Quiet cadence is 50ms; give the loop room for several cycles
    tokio::time::sleep(Duration::from_millis(400)).await;
    orchestrator.stop().await;

    let health = orchestrator.get_health_status();
    assert!(health.performance.total_updates >= 1);

    let state = orchestrator.get_feature_state("BTCUSDT").unwrap();
    assert!(state.last_update_at.is_some());

    // Stopping again is a no-op
    orchestrator.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_symbols_registered_while_running_get_loops() {
    let rate = Arc::new(EventRateTracker::new());
    let store = Arc::new(MicrostructureStore::new(Arc::clone(&rate)));
    seed_symbol(&store, "BTCUSDT");
    let orchestrator = make_orchestrator(Arc::clone(&store), rate);
    orchestrator.initialize(&["BTCUSDT".to_string()]).unwrap();
    orchestrator.start();

    // A symbol registered after start still gets its own update loop
    seed_symbol(&store, "ETHUSDT");
    orchestrator.initialize(&["ETHUSDT".to_string()]).unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    orchestrator.stop().await;

    let state = orchestrator.get_feature_state("ETHUSDT").unwrap();
    assert!(state.last_update_at.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_backoff_symbol_activates_on_late_data() {
    let rate = Arc::new(EventRateTracker::new());
    let store = Arc::new(MicrostructureStore::new(Arc::clone(&rate)));
    let orchestrator = make_orchestrator(Arc::clone(&store), rate);
    orchestrator.initialize(&["ETHUSDT".to_string()]).unwrap();
    orchestrator.start();

    // Data arrives after start; a manual update promotes the symbol
    seed_symbol(&store, "ETHUSDT");
    assert!(orchestrator.update_symbol("ETHUSDT").await);
    assert!(orchestrator
        .get_feature_state("ETHUSDT")
        .unwrap()
        .last_update_at
        .is_some());

    orchestrator.stop().await;
}
