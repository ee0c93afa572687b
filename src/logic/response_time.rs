//! Response-Time Estimator
//!
//! Blends a rolling window of observed acknowledge-latencies with the
//! live wait time of currently pending alerts into one continuously
//! refreshed display value. The jitter term keeps the dashboard metric
//! visibly alive; the blend weights and caps are fixed for behavioral
//! parity with the dashboard's SLA display.

use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;

use crate::constants::{
    FALLBACK_BASELINE_SECS, HISTORY_BLEND_WEIGHT, MAX_RESPONSE_SECS, MIN_DISPLAY_SECS,
    PENDING_BLEND_WEIGHT, RESPONSE_SAMPLE_WINDOW,
};

pub struct ResponseTimeEstimator {
    samples: Mutex<VecDeque<f64>>,
    current_secs: Mutex<f64>,
}

impl ResponseTimeEstimator {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(RESPONSE_SAMPLE_WINDOW)),
            current_secs: Mutex::new(FALLBACK_BASELINE_SECS),
        }
    }

    /// Record one observed acknowledge-latency (seconds). Individually
    /// capped so a single stale alert cannot distort the average past
    /// the 15-minute display threshold.
    pub fn record_sample(&self, latency_secs: f64) {
        let capped = latency_secs.clamp(0.0, MAX_RESPONSE_SECS);
        let mut samples = self.samples.lock();
        samples.push_back(capped);
        while samples.len() > RESPONSE_SAMPLE_WINDOW {
            samples.pop_front();
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.lock().len()
    }

    /// Recompute the display value from the live pending wait times.
    /// Called once per second while the engine runs.
    pub fn refresh(&self, pending_ages_secs: &[f64]) -> f64 {
        let pending_avg = mean(pending_ages_secs).unwrap_or(0.0);
        let history_avg = {
            let mut samples = self.samples.lock();
            mean(samples.make_contiguous())
        };

        let blended = blend(history_avg, pending_avg);

        let now_ms = Utc::now().timestamp_millis();
        let displayed = (blended + jitter(now_ms)).clamp(MIN_DISPLAY_SECS, MAX_RESPONSE_SECS);

        *self.current_secs.lock() = displayed;
        displayed
    }

    /// Latest displayed estimate, seconds
    pub fn current_secs(&self) -> f64 {
        *self.current_secs.lock()
    }

    /// Latest displayed estimate, formatted as minutes+seconds
    pub fn display(&self) -> String {
        format_minutes_seconds(self.current_secs())
    }
}

impl Default for ResponseTimeEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// 0.7/0.3 history/pending blend with the 45s no-data baseline
fn blend(history_avg: Option<f64>, pending_avg: f64) -> f64 {
    match history_avg {
        Some(history) => HISTORY_BLEND_WEIGHT * history + PENDING_BLEND_WEIGHT * pending_avg,
        None if pending_avg == 0.0 => FALLBACK_BASELINE_SECS,
        None => pending_avg,
    }
}

/// Deterministic-plus-random liveness jitter, bounded to +-4s
fn jitter(now_ms: i64) -> f64 {
    let wave = 3.0 * (now_ms as f64 / 2000.0).sin();
    wave + rand::thread_rng().gen_range(-1.0..1.0)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn format_minutes_seconds(secs: f64) -> String {
    let total = secs.round().max(0.0) as u64;
    format!("{}m {:02}s", total / 60, total % 60)
}
