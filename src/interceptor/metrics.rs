use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Interceptor;
use crate::endpoint::RequestContext;
use crate::error::NetworkError;

/// Per-feature counters
#[derive(Debug, Default)]
struct FeatureStats {
    sends: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    bytes_received: AtomicU64,
}

/// Point-in-time copy of one feature's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureSnapshot {
    pub sends: u64,
    pub successes: u64,
    pub failures: u64,
    pub bytes_received: u64,
}

/// Counts sends, outcomes and received bytes per feature tag
#[derive(Debug, Default)]
pub struct MetricsInterceptor {
    features: DashMap<String, FeatureStats>,
}

impl MetricsInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, feature: &str, f: impl FnOnce(&FeatureStats)) {
        if let Some(stats) = self.features.get(feature) {
            f(stats.value());
            return;
        }
        let stats = self.features.entry(feature.to_string()).or_default();
        f(stats.value());
    }

    pub fn snapshot(&self, feature: &str) -> FeatureSnapshot {
        self.features
            .get(feature)
            .map(|stats| FeatureSnapshot {
                sends: stats.sends.load(Ordering::Relaxed),
                successes: stats.successes.load(Ordering::Relaxed),
                failures: stats.failures.load(Ordering::Relaxed),
                bytes_received: stats.bytes_received.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    /// Feature tags seen so far, sorted
    pub fn features(&self) -> Vec<String> {
        let mut names: Vec<String> = self.features.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[async_trait]
impl Interceptor for MetricsInterceptor {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn did_create_task(&self, context: &RequestContext, _attempt_count: u32) {
        self.record(&context.target.feature, |s| {
            s.sends.fetch_add(1, Ordering::Relaxed);
        });
    }

    fn did_receive_data(&self, context: &RequestContext, data: &[u8]) {
        self.record(&context.target.feature, |s| {
            s.bytes_received.fetch_add(data.len() as u64, Ordering::Relaxed);
        });
    }

    fn did_complete(&self, context: &RequestContext, outcome: Result<u16, &NetworkError>) {
        self.record(&context.target.feature, |s| {
            match outcome {
                Ok(_) => s.successes.fetch_add(1, Ordering::Relaxed),
                Err(_) => s.failures.fetch_add(1, Ordering::Relaxed),
            };
        });
    }
}
