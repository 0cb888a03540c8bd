use crate::hysteresis::HysteresisPolicy;
use crate::state::{new_state, Shared};
use crate::watcher::{WatchStats, Watcher};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceHealth {
    pub uptime_seconds: u64,
    pub watching: bool,
    pub hosts_tracked: usize,
    pub probes_dispatched: u64,
    pub replies_applied: u64,
    pub stale_replies_dropped: u64,
    pub superseded_skipped: u64,
    pub suppressed_hosts: usize,
    pub mqtt_status: String,
    pub mqtt_reconnects: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    mqtt_reconnects: Arc<AtomicU32>,
    mqtt_status: Shared<String>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            mqtt_reconnects: Arc::new(AtomicU32::new(0)),
            mqtt_status: new_state("disabled".to_string()),
        }
    }

    pub fn mark_mqtt_connecting(&self) {
        *self.mqtt_status.lock() = "connecting".to_string();
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn get_health(&self, watcher: &Watcher, policy: &Shared<HysteresisPolicy>) -> ServiceHealth {
        let WatchStats {
            watching,
            hosts_tracked,
            probes_dispatched,
            replies_applied,
            stale_replies_dropped,
            superseded_skipped,
        } = watcher.stats();

        ServiceHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            watching,
            hosts_tracked,
            probes_dispatched,
            replies_applied,
            stale_replies_dropped,
            superseded_skipped,
            suppressed_hosts: policy.lock().suppressed().len(),
            mqtt_status: self.mqtt_status.lock().clone(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
        }
    }
}
