//! Request counters kept per reporting window.

use serde::Serialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsInterval {
    Daily,
    Weekly,
    Monthly,
}

impl MetricsInterval {
    pub const ALL: [MetricsInterval; 3] = [
        MetricsInterval::Daily,
        MetricsInterval::Weekly,
        MetricsInterval::Monthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricsInterval::Daily => "daily",
            MetricsInterval::Weekly => "weekly",
            MetricsInterval::Monthly => "monthly",
        }
    }
}

impl FromStr for MetricsInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(MetricsInterval::Daily),
            "weekly" => Ok(MetricsInterval::Weekly),
            "monthly" => Ok(MetricsInterval::Monthly),
            other => Err(format!("unknown metrics interval: {}", other)),
        }
    }
}

#[derive(Default)]
struct WindowCounters {
    upserted_items: AtomicU64,
    deleted_items: AtomicU64,
    rejected_requests: AtomicU64,
}

impl WindowCounters {
    fn snapshot(&self, interval: MetricsInterval) -> MetricsSnapshot {
        MetricsSnapshot {
            interval,
            upserted_items: self.upserted_items.load(Ordering::Relaxed),
            deleted_items: self.deleted_items.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.upserted_items.store(0, Ordering::Relaxed);
        self.deleted_items.store(0, Ordering::Relaxed);
        self.rejected_requests.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub interval: MetricsInterval,
    pub upserted_items: u64,
    pub deleted_items: u64,
    pub rejected_requests: u64,
}

/// Every recording lands in all three windows; the scheduled jobs clear them independently.
#[derive(Default)]
pub struct Metrics {
    daily: WindowCounters,
    weekly: WindowCounters,
    monthly: WindowCounters,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn window(&self, interval: MetricsInterval) -> &WindowCounters {
        match interval {
            MetricsInterval::Daily => &self.daily,
            MetricsInterval::Weekly => &self.weekly,
            MetricsInterval::Monthly => &self.monthly,
        }
    }

    fn each(&self, f: impl Fn(&WindowCounters)) {
        for interval in MetricsInterval::ALL {
            f(self.window(interval));
        }
    }

    pub fn record_upserts(&self, count: u64) {
        self.each(|w| {
            w.upserted_items.fetch_add(count, Ordering::Relaxed);
        });
    }

    pub fn record_deletes(&self, count: u64) {
        self.each(|w| {
            w.deleted_items.fetch_add(count, Ordering::Relaxed);
        });
    }

    pub fn record_rejection(&self) {
        self.each(|w| {
            w.rejected_requests.fetch_add(1, Ordering::Relaxed);
        });
    }

    pub fn snapshot(&self, interval: MetricsInterval) -> MetricsSnapshot {
        self.window(interval).snapshot(interval)
    }

    pub fn clear(&self, interval: MetricsInterval) {
        self.window(interval).reset();
    }
}
