//! Thread-safe routing metrics
//!
//! Atomic counters for high-frequency events and mutex-protected maps for
//! per-method, per-strategy and per-layer breakdowns.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MAX_TIMING_SAMPLES: usize = 1000;

/// Global metrics collector instance
pub static METRICS: Lazy<RoutingMetrics> = Lazy::new(RoutingMetrics::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static RoutingMetrics {
    &METRICS
}

#[derive(Debug, Default, Clone)]
struct LayerStats {
    attempts: u64,
    failures: u64,
    qualified: u64,
}

/// Thread-safe routing metrics collector
pub struct RoutingMetrics {
    decisions_total: AtomicU64,
    permission_denials: AtomicU64,
    fallbacks: AtomicU64,
    decision_log_failures: AtomicU64,
    feedback_recorded: AtomicU64,
    feedback_log_failures: AtomicU64,
    events_published: AtomicU64,
    event_publish_failures: AtomicU64,

    decisions_by_method: Mutex<HashMap<String, u64>>,
    decisions_by_strategy: Mutex<HashMap<String, u64>>,
    layer_stats: Mutex<HashMap<String, LayerStats>>,
    // microseconds
    routing_times: Mutex<Vec<u64>>,
}

impl RoutingMetrics {
    pub fn new() -> Self {
        Self {
            decisions_total: AtomicU64::new(0),
            permission_denials: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            decision_log_failures: AtomicU64::new(0),
            feedback_recorded: AtomicU64::new(0),
            feedback_log_failures: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            event_publish_failures: AtomicU64::new(0),
            decisions_by_method: Mutex::new(HashMap::new()),
            decisions_by_strategy: Mutex::new(HashMap::new()),
            layer_stats: Mutex::new(HashMap::new()),
            routing_times: Mutex::new(Vec::new()),
        }
    }

    pub fn decision_recorded(&self, method: &str, strategy: &str, duration: Duration) {
        self.decisions_total.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_method) = self.decisions_by_method.lock() {
            *by_method.entry(method.to_string()).or_insert(0) += 1;
        }
        if let Ok(mut by_strategy) = self.decisions_by_strategy.lock() {
            *by_strategy.entry(strategy.to_string()).or_insert(0) += 1;
        }
        if let Ok(mut times) = self.routing_times.lock() {
            times.push(duration.as_micros() as u64);
            if times.len() > MAX_TIMING_SAMPLES {
                times.remove(0);
            }
        }
    }

    pub fn permission_denied(&self) {
        self.permission_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fallback_used(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    fn with_layer<F: FnOnce(&mut LayerStats)>(&self, layer: &str, update: F) {
        if let Ok(mut stats) = self.layer_stats.lock() {
            update(stats.entry(layer.to_string()).or_default());
        }
    }

    pub fn layer_attempted(&self, layer: &str) {
        self.with_layer(layer, |s| s.attempts += 1);
    }

    pub fn layer_failed(&self, layer: &str) {
        self.with_layer(layer, |s| s.failures += 1);
    }

    pub fn layer_qualified(&self, layer: &str) {
        self.with_layer(layer, |s| s.qualified += 1);
    }

    pub fn decision_log_failed(&self) {
        self.decision_log_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn feedback_recorded(&self) {
        self.feedback_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn feedback_log_failed(&self) {
        self.feedback_log_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_publish_failed(&self) {
        self.event_publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.decisions_total,
            &self.permission_denials,
            &self.fallbacks,
            &self.decision_log_failures,
            &self.feedback_recorded,
            &self.feedback_log_failures,
            &self.events_published,
            &self.event_publish_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut map) = self.decisions_by_method.lock() {
            map.clear();
        }
        if let Ok(mut map) = self.decisions_by_strategy.lock() {
            map.clear();
        }
        if let Ok(mut map) = self.layer_stats.lock() {
            map.clear();
        }
        if let Ok(mut times) = self.routing_times.lock() {
            times.clear();
        }
    }

    fn latency_statistics(&self) -> (f64, f64) {
        let Ok(times) = self.routing_times.lock() else {
            return (0.0, 0.0);
        };
        if times.is_empty() {
            return (0.0, 0.0);
        }

        let mut sorted = times.clone();
        sorted.sort_unstable();
        let avg_us = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        (avg_us / 1000.0, percentile(&sorted, 95.0) / 1000.0)
    }

    fn sorted_counts(map: &Mutex<HashMap<String, u64>>) -> BTreeMap<String, u64> {
        map.lock()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default()
    }

    fn layer_snapshots(&self) -> BTreeMap<String, LayerStatsSnapshot> {
        self.layer_stats
            .lock()
            .map(|stats| {
                stats
                    .iter()
                    .map(|(name, s)| {
                        let failure_rate = if s.attempts == 0 {
                            0.0
                        } else {
                            s.failures as f64 / s.attempts as f64
                        };
                        (
                            name.clone(),
                            LayerStatsSnapshot {
                                attempts: s.attempts,
                                failures: s.failures,
                                qualified: s.qualified,
                                failure_rate,
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get complete metrics snapshot
    pub fn get_metrics(&self) -> RoutingMetricsSnapshot {
        let total = self.decisions_total.load(Ordering::Relaxed);
        let by_method = Self::sorted_counts(&self.decisions_by_method);
        let method_share = by_method
            .iter()
            .map(|(method, count)| {
                let share = if total == 0 {
                    0.0
                } else {
                    *count as f64 / total as f64
                };
                (method.clone(), share)
            })
            .collect();
        let (avg_routing_time_ms, routing_time_p95_ms) = self.latency_statistics();

        RoutingMetricsSnapshot {
            decisions: DecisionMetrics {
                total,
                by_method,
                method_share,
                by_strategy: Self::sorted_counts(&self.decisions_by_strategy),
                fallbacks: self.fallbacks.load(Ordering::Relaxed),
                permission_denials: self.permission_denials.load(Ordering::Relaxed),
                avg_routing_time_ms,
                routing_time_p95_ms,
            },
            cascade: CascadeMetrics {
                layers: self.layer_snapshots(),
            },
            journal: JournalMetrics {
                decision_log_failures: self.decision_log_failures.load(Ordering::Relaxed),
                feedback_recorded: self.feedback_recorded.load(Ordering::Relaxed),
                feedback_log_failures: self.feedback_log_failures.load(Ordering::Relaxed),
            },
            events: EventMetrics {
                published: self.events_published.load(Ordering::Relaxed),
                publish_failures: self.event_publish_failures.load(Ordering::Relaxed),
            },
            timestamp: current_timestamp(),
        }
    }
}

impl Default for RoutingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct RoutingMetricsSnapshot {
    pub decisions: DecisionMetrics,
    pub cascade: CascadeMetrics,
    pub journal: JournalMetrics,
    pub events: EventMetrics,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct DecisionMetrics {
    pub total: u64,
    pub by_method: BTreeMap<String, u64>,
    /// Fraction of all decisions per routing method
    pub method_share: BTreeMap<String, f64>,
    pub by_strategy: BTreeMap<String, u64>,
    pub fallbacks: u64,
    pub permission_denials: u64,
    pub avg_routing_time_ms: f64,
    pub routing_time_p95_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct CascadeMetrics {
    pub layers: BTreeMap<String, LayerStatsSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct LayerStatsSnapshot {
    pub attempts: u64,
    pub failures: u64,
    pub qualified: u64,
    pub failure_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct JournalMetrics {
    pub decision_log_failures: u64,
    pub feedback_recorded: u64,
    pub feedback_log_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct EventMetrics {
    pub published: u64,
    pub publish_failures: u64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let len = sorted_data.len();
    let index = (percentile / 100.0) * (len - 1) as f64;

    if index.fract() == 0.0 {
        sorted_data[index as usize] as f64
    } else {
        let lower = sorted_data[index.floor() as usize] as f64;
        let upper = sorted_data[index.ceil() as usize] as f64;
        lower + (upper - lower) * index.fract()
    }
}
