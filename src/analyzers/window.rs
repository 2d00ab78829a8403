// Rolling Time Window - timestamped samples with age pruning and a capacity cap

use std::collections::VecDeque;

/// One timestamped sample
#[derive(Debug, Clone, Copy)]
pub struct Sample<T> {
    pub timestamp: i64,
    pub value: T,
}

/// Bounded rolling window of (timestamp, value) samples.
/// Old samples fall out by age on `prune`; the capacity cap prevents
/// unbounded growth between prunes.
pub struct TimeWindow<T> {
    duration_ms: i64,
    max_capacity: usize,
    samples: VecDeque<Sample<T>>,
}

impl<T> TimeWindow<T> {
    pub fn new(duration_ms: i64, max_capacity: usize) -> Self {
        Self {
            duration_ms,
            max_capacity,
            samples: VecDeque::with_capacity(max_capacity.min(4096)),
        }
    }

    pub fn push(&mut self, timestamp: i64, value: T) {
        if self.samples.len() >= self.max_capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { timestamp, value });
    }

    /// Drop samples older than the window duration relative to `now`
    pub fn prune(&mut self, now: i64) {
        let cutoff = now - self.duration_ms;
        while let Some(front) = self.samples.front() {
            if front.timestamp < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample<T>> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn newest(&self) -> Option<&Sample<T>> {
        self.samples.back()
    }

    pub fn oldest(&self) -> Option<&Sample<T>> {
        self.samples.front()
    }

    /// Sample whose timestamp is closest to `target`
    pub fn nearest(&self, target: i64) -> Option<&Sample<T>> {
        self.samples
            .iter()
            .min_by_key(|s| (s.timestamp - target).abs())
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl TimeWindow<f64> {
    pub fn sum(&self) -> f64 {
        self.samples.iter().map(|s| s.value).sum()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.sum() / self.samples.len() as f64)
        }
    }
}
