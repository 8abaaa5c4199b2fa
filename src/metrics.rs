//! In-process observability for the request path: outcome counters plus
//! latency windows summarized at p50/p95/p99, served at /metrics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

/// Samples kept per latency metric; older samples fall off once full.
const WINDOW_CAPACITY: usize = 1024;

/// A running timer that records its elapsed time on stop.
pub struct Timer {
    name: &'static str,
    started: Instant,
    registry: Arc<MetricsRegistry>,
}

impl Timer {
    /// Stop the timer, recording elapsed microseconds.
    pub fn stop(self) -> f64 {
        let elapsed_us = self.started.elapsed().as_micros() as f64;
        self.registry.observe(self.name, elapsed_us);
        elapsed_us
    }
}

/// Sliding window of recent latency samples.
struct LatencyWindow {
    samples: Vec<f64>,
    next: usize,
}

impl LatencyWindow {
    fn new() -> Self {
        Self {
            samples: Vec::new(),
            next: 0,
        }
    }

    fn push(&mut self, value_us: f64) {
        if self.samples.len() < WINDOW_CAPACITY {
            self.samples.push(value_us);
        } else {
            self.samples[self.next] = value_us;
            self.next = (self.next + 1) % WINDOW_CAPACITY;
        }
    }

    /// Quantile over the current window, q in [0, 1].
    fn quantile(&self, q: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(f64::total_cmp);
        let rank = (q * (sorted.len() - 1) as f64).round() as usize;
        sorted[rank.min(sorted.len() - 1)]
    }
}

/// Counters and latency windows for the translate path.
pub struct MetricsRegistry {
    counters: Mutex<HashMap<&'static str, u64>>,
    latencies: Mutex<HashMap<&'static str, LatencyWindow>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            latencies: Mutex::new(HashMap::new()),
        }
    }

    /// Bump a named counter by one.
    pub fn incr(&self, name: &'static str) {
        *self.counters.lock().entry(name).or_insert(0) += 1;
    }

    /// Record one latency sample, in microseconds.
    pub fn observe(&self, name: &'static str, value_us: f64) {
        self.latencies
            .lock()
            .entry(name)
            .or_insert_with(LatencyWindow::new)
            .push(value_us);
    }

    /// Start a timer that records into `name` when stopped.
    pub fn timer(self: &Arc<Self>, name: &'static str) -> Timer {
        Timer {
            name,
            started: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Point-in-time view of all counters and latency summaries.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .counters
            .lock()
            .iter()
            .map(|(&name, &value)| (name.to_string(), value))
            .collect();

        let latencies = self
            .latencies
            .lock()
            .iter()
            .map(|(&name, window)| {
                (
                    name.to_string(),
                    LatencySummary {
                        p50_us: window.quantile(0.50),
                        p95_us: window.quantile(0.95),
                        p99_us: window.quantile(0.99),
                        samples: window.samples.len(),
                    },
                )
            })
            .collect();

        MetricsSnapshot { counters, latencies }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub latencies: HashMap<String, LatencySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub samples: usize,
}

/// Well-known metric names (constants to avoid typos).
pub mod metric_names {
    pub const REQUESTS: &str = "translate_requests";
    pub const CACHE_HITS: &str = "translate_cache_hits";
    pub const RATE_LIMITED: &str = "translate_rate_limited";
    pub const PROVIDER_ERRORS: &str = "translate_provider_errors";

    pub const REQUEST_US: &str = "t_request";
    pub const PROVIDER_US: &str = "t_provider_call";
    pub const HISTORY_WRITE_US: &str = "t_history_write";
}
