//! LinkWatch kernel - continuous connectivity scoring for camera/control links
//!
//! Periodically probes named hosts with the system ping utility, folds each
//! reply into a 0-100 health score and drives an edge-triggered policy that
//! switches a dependent feed off on sustained degradation.

pub mod config;
pub mod correlator;
pub mod error;
pub mod health;
pub mod http;
pub mod hysteresis;
pub mod models;
pub mod mqtt;
pub mod probe;
pub mod scheduler;
pub mod score;
pub mod state;
pub mod watcher;

pub use error::{ConfigError, ProbeError, WatchError};
pub use hysteresis::{spawn_policy, HysteresisPolicy, ResourceController, SuppressionState, Transition};
pub use models::{HostScoreState, ProbeOutcome, RequestId, RttSource, WatchEvent};
pub use probe::{PingExecutor, PingSettings, Prober};
pub use watcher::{WatchSettings, WatchStats, Watcher};
