//! Logging setup and request counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[derive(Default)]
pub struct Metrics {
    pub tokens_issued: AtomicU64,
    pub issuance_denied: AtomicU64,
    pub issuance_errors: AtomicU64,
    pub reviews_authenticated: AtomicU64,
    pub reviews_rejected: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_issued(&self) {
        self.tokens_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denied(&self) {
        self.issuance_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_issuance_error(&self) {
        self.issuance_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_review(&self, authenticated: bool) {
        let counter = if authenticated {
            &self.reviews_authenticated
        } else {
            &self.reviews_rejected
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tokens_issued: self.tokens_issued.load(Ordering::Relaxed),
            issuance_denied: self.issuance_denied.load(Ordering::Relaxed),
            issuance_errors: self.issuance_errors.load(Ordering::Relaxed),
            reviews_authenticated: self.reviews_authenticated.load(Ordering::Relaxed),
            reviews_rejected: self.reviews_rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tokens_issued: u64,
    pub issuance_denied: u64,
    pub issuance_errors: u64,
    pub reviews_authenticated: u64,
    pub reviews_rejected: u64,
}
