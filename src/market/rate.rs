// Global Event Rate Tracker
// Atomic counter of raw market events, rate recomputed at most once per second

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::types::now_ms;

struct RateWindow {
    window_start_ms: i64,
    events_at_window_start: u64,
    current_rate: f64,
}

/// Shared events-per-second counter. The ingestion layer increments it on
/// every raw market event; every symbol loop reads it to pick its next
/// update interval. A rate up to one second old is acceptable.
pub struct EventRateTracker {
    total_events: AtomicU64,
    window: Mutex<RateWindow>,
}

impl EventRateTracker {
    pub fn new() -> Self {
        Self {
            total_events: AtomicU64::new(0),
            window: Mutex::new(RateWindow {
                window_start_ms: now_ms(),
                events_at_window_start: 0,
                current_rate: 0.0,
            }),
        }
    }

    /// Record one raw market event (lock-free)
    pub fn record_event(&self) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events(&self, count: u64) {
        self.total_events.fetch_add(count, Ordering::Relaxed);
    }

    pub fn total_events(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }

    /// Current events-per-second estimate. Recomputed lazily when the
    /// one-second window has elapsed; otherwise returns the cached rate.
    pub fn events_per_second(&self) -> f64 {
        self.events_per_second_at(now_ms())
    }

    /// Testable variant taking an explicit clock
    pub fn events_per_second_at(&self, now: i64) -> f64 {
        let mut window = self.window.lock();
        let elapsed_ms = now - window.window_start_ms;
        if elapsed_ms >= 1000 {
            let total = self.total_events.load(Ordering::Relaxed);
            let delta = total.saturating_sub(window.events_at_window_start);
            window.current_rate = delta as f64 * 1000.0 / elapsed_ms as f64;
            window.window_start_ms = now;
            window.events_at_window_start = total;
        }
        window.current_rate
    }
}

impl Default for EventRateTracker {
    fn default() -> Self {
        Self::new()
    }
}
