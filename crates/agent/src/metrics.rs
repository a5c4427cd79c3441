//! Request counters and response-time window

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

/// Response times kept for the rolling average
const RESPONSE_TIME_WINDOW: usize = 100;

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cache_hits: u64,
    pub quota_rejections: u64,
    pub average_response_time_ms: f64,
}

#[derive(Default)]
struct Counters {
    snapshot: MetricsSnapshot,
    response_times: VecDeque<u64>,
}

#[derive(Default)]
pub struct ChatMetrics {
    inner: Mutex<Counters>,
}

impl ChatMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, response_time_ms: u64) {
        let mut inner = self.inner.lock();
        inner.snapshot.total_requests += 1;
        inner.snapshot.successful_requests += 1;
        Self::push_time(&mut inner, response_time_ms);
    }

    pub fn record_failure(&self, response_time_ms: u64) {
        let mut inner = self.inner.lock();
        inner.snapshot.total_requests += 1;
        inner.snapshot.failed_requests += 1;
        Self::push_time(&mut inner, response_time_ms);
    }

    pub fn record_cache_hit(&self) {
        let mut inner = self.inner.lock();
        inner.snapshot.total_requests += 1;
        inner.snapshot.cache_hits += 1;
    }

    pub fn record_quota_rejection(&self) {
        let mut inner = self.inner.lock();
        inner.snapshot.total_requests += 1;
        inner.snapshot.quota_rejections += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().snapshot.clone()
    }

    fn push_time(inner: &mut Counters, response_time_ms: u64) {
        if inner.response_times.len() == RESPONSE_TIME_WINDOW {
            inner.response_times.pop_front();
        }
        inner.response_times.push_back(response_time_ms);
        let sum: u64 = inner.response_times.iter().sum();
        inner.snapshot.average_response_time_ms = sum as f64 / inner.response_times.len() as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = ChatMetrics::new();
        metrics.record_success(100);
        metrics.record_failure(300);
        metrics.record_cache_hit();
        metrics.record_quota_rejection();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 4);
        assert_eq!(snapshot.successful_requests, 1);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.quota_rejections, 1);
        assert_eq!(snapshot.average_response_time_ms, 200.0);
    }

    #[test]
    fn test_average_uses_recent_window() {
        let metrics = ChatMetrics::new();
        for _ in 0..RESPONSE_TIME_WINDOW {
            metrics.record_success(1000);
        }
        for _ in 0..RESPONSE_TIME_WINDOW {
            metrics.record_success(10);
        }
        assert_eq!(metrics.snapshot().average_response_time_ms, 10.0);
    }
}
