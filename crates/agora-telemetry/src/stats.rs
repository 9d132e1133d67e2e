use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonic counter.
#[derive(Default)]
struct Counter {
    value: AtomicU64,
}

impl Counter {
    fn increment(&self, n: u64) {
        let _ = self.value.fetch_add(n, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Up/down gauge.
#[derive(Default)]
struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    fn add(&self, delta: i64) {
        let _ = self.value.fetch_add(delta, Ordering::Relaxed);
    }

    fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Why a single delivery attempt did not reach the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropKind {
    Offline,
    QueueFull,
    Closed,
    Encode,
}

/// Process-wide delivery counters. Cheap to update from any task.
#[derive(Default)]
pub struct DeliveryStats {
    delivered: Counter,
    dropped_offline: Counter,
    dropped_queue_full: Counter,
    dropped_closed: Counter,
    dropped_encode: Counter,
    sessions_opened: Counter,
    sessions_closed: Counter,
    sessions_active: Gauge,
    auth_failures: Counter,
    frames_ignored: Counter,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatsSnapshot {
    pub delivered: u64,
    pub dropped_offline: u64,
    pub dropped_queue_full: u64,
    pub dropped_closed: u64,
    pub dropped_encode: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub sessions_active: i64,
    pub auth_failures: u64,
    pub frames_ignored: u64,
}

impl DeliveryStatsSnapshot {
    pub fn dropped(&self) -> u64 {
        self.dropped_offline + self.dropped_queue_full + self.dropped_closed + self.dropped_encode
    }
}

impl DeliveryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_delivered(&self) {
        self.delivered.increment(1);
    }

    pub fn record_dropped(&self, kind: DropKind) {
        match kind {
            DropKind::Offline => self.dropped_offline.increment(1),
            DropKind::QueueFull => self.dropped_queue_full.increment(1),
            DropKind::Closed => self.dropped_closed.increment(1),
            DropKind::Encode => self.dropped_encode.increment(1),
        }
    }

    pub fn record_session_opened(&self) {
        self.sessions_opened.increment(1);
        self.sessions_active.add(1);
    }

    pub fn record_session_closed(&self) {
        self.sessions_closed.increment(1);
        self.sessions_active.add(-1);
    }

    pub fn record_auth_failure(&self) {
        self.auth_failures.increment(1);
    }

    pub fn record_frame_ignored(&self) {
        self.frames_ignored.increment(1);
    }

    pub fn snapshot(&self) -> DeliveryStatsSnapshot {
        DeliveryStatsSnapshot {
            delivered: self.delivered.get(),
            dropped_offline: self.dropped_offline.get(),
            dropped_queue_full: self.dropped_queue_full.get(),
            dropped_closed: self.dropped_closed.get(),
            dropped_encode: self.dropped_encode.get(),
            sessions_opened: self.sessions_opened.get(),
            sessions_closed: self.sessions_closed.get(),
            sessions_active: self.sessions_active.get(),
            auth_failures: self.auth_failures.get(),
            frames_ignored: self.frames_ignored.get(),
        }
    }
}
