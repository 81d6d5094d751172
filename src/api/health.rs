//! Shared health state for the /health endpoint.
//! Updated by DealFetcher, DealProcessor, and QueueDispatcher.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Liveness counters. Written by pipeline components, read by the API.
#[derive(Default)]
pub struct HealthState {
    /// Unix seconds of the last completed scrape cycle (0 = none yet).
    pub last_scrape_at_secs: AtomicI64,
    pub deals_evaluated: AtomicU64,
    pub deals_queued: AtomicU64,
    pub notifications_sent: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_last_scrape_at(&self, secs: i64) {
        self.last_scrape_at_secs.store(secs, Ordering::Relaxed);
    }

    pub fn inc_deals_evaluated(&self) {
        self.deals_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deals_queued(&self) {
        self.deals_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notifications_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_notifications_sent(&self, n: u64) {
        self.notifications_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn last_scrape_at_secs(&self) -> i64 {
        self.last_scrape_at_secs.load(Ordering::Relaxed)
    }

    pub fn deals_evaluated(&self) -> u64 {
        self.deals_evaluated.load(Ordering::Relaxed)
    }

    pub fn deals_queued(&self) -> u64 {
        self.deals_queued.load(Ordering::Relaxed)
    }

    pub fn notifications_sent(&self) -> u64 {
        self.notifications_sent.load(Ordering::Relaxed)
    }
}
