use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identifier attached to every dispatched probe. Strictly increasing, never reused.
pub type RequestId = u64;

/// Where the round-trip time of an outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RttSource {
    /// `min/avg/max` summary line.
    Summary,
    /// Average of the per-reply `time=` samples.
    Samples,
    /// Probe exited cleanly but no RTT could be parsed; reported as 0 ms.
    Defaulted,
    /// No RTT (failed probe).
    #[default]
    Unavailable,
}

/// Result of a single probe. Built once by the executor, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub success: bool,
    pub rtt_ms: Option<f64>,
    pub rtt_source: RttSource,
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ProbeOutcome {
    pub fn reachable(rtt_ms: f64, rtt_source: RttSource) -> Self {
        Self {
            success: true,
            rtt_ms: Some(rtt_ms),
            rtt_source,
            error: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            success: false,
            rtt_ms: None,
            rtt_source: RttSource::Unavailable,
            error: Some(error.into()),
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Rolling statistics and derived scores for one host.
///
/// A default value is what `Watcher::score` returns for an unknown host and what
/// a freshly (re-)registered host starts from: no probes, unreachable, all scores 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HostScoreState {
    pub host_name: String,
    pub host_address: String,

    // latest outcome
    pub reachable: bool,
    pub current_rtt_ms: Option<f64>,
    pub rtt_source: RttSource,
    pub last_error: Option<String>,

    pub total_probes: u64,
    pub successful_probes: u64,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    /// Successful probes that carried an RTT; the divisor of the running mean.
    pub rtt_samples: u64,
    pub min_rtt_ms: Option<f64>,
    pub max_rtt_ms: Option<f64>,
    pub average_rtt_ms: f64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub first_seen: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,

    pub reliability_score: u8,
    pub performance_score: u8,
    pub stability_score: u8,
    pub overall_score: u8,
}

impl HostScoreState {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            host_name: name.to_string(),
            host_address: address.to_string(),
            ..Self::default()
        }
    }

    pub fn packet_loss_percent(&self) -> f64 {
        if self.total_probes == 0 {
            return 0.0;
        }
        (self.total_probes - self.successful_probes) as f64 / self.total_probes as f64 * 100.0
    }
}

/// Registry entry for a watched host. Lives behind the watcher's single lock.
#[derive(Debug, Clone)]
pub struct HostEntry {
    pub name: String,
    pub address: String,
    pub registered_at: OffsetDateTime,
    /// Reachability of the last applied outcome; starts unreachable.
    pub last_reachable: bool,
    pub pending: Option<RequestId>,
    pub score: HostScoreState,
}

impl HostEntry {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            registered_at: OffsetDateTime::now_utc(),
            last_reachable: false,
            pending: None,
            score: HostScoreState::new(name, address),
        }
    }
}

/// Events published by the watcher for every correlated outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    /// Sent on every outcome, not only on edges.
    StatusChanged {
        host: String,
        reachable: bool,
        rtt_ms: Option<f64>,
    },
    /// Sent once per reachability edge; `message` is empty on recovery.
    Error { host: String, message: String },
    ScoreUpdated { host: String, score: HostScoreState },
    /// Host deregistered; `score` is its last state.
    HostRemoved { host: String, score: HostScoreState },
}

impl WatchEvent {
    pub fn host(&self) -> &str {
        match self {
            WatchEvent::StatusChanged { host, .. }
            | WatchEvent::Error { host, .. }
            | WatchEvent::ScoreUpdated { host, .. }
            | WatchEvent::HostRemoved { host, .. } => host,
        }
    }
}
