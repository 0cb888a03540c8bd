//! Low-connectivity suppression
//!
//! Maps each host's score stream to an edge-triggered suppress/restore decision
//! so the dependent resource (the video feed) is toggled once per threshold
//! crossing and never flaps while the score stays on one side.

use crate::models::{HostScoreState, WatchEvent};
use crate::state::Shared;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub const DEFAULT_SUPPRESS_THRESHOLD: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionState {
    #[default]
    Active,
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Suppress,
    Restore,
}

/// The resource being switched off and on, e.g. a video receiver.
pub trait ResourceController: Send {
    fn disable(&mut self, host: &str, score: &HostScoreState);
    fn enable(&mut self, host: &str, score: &HostScoreState);
}

/// Controller that only logs; used when nothing else is wired.
#[derive(Debug, Default)]
pub struct LoggingController;

impl ResourceController for LoggingController {
    fn disable(&mut self, host: &str, score: &HostScoreState) {
        warn!(
            "Camera {} video disabled due to poor connectivity (score {}%)",
            host, score.overall_score
        );
    }

    fn enable(&mut self, host: &str, score: &HostScoreState) {
        info!("Camera {} video restored (score {}%)", host, score.overall_score);
    }
}

#[derive(Debug, Clone)]
pub struct HysteresisPolicy {
    threshold: u8,
    states: HashMap<String, SuppressionState>,
}

impl Default for HysteresisPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPRESS_THRESHOLD)
    }
}

impl HysteresisPolicy {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            states: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn state(&self, host: &str) -> SuppressionState {
        self.states.get(host).copied().unwrap_or_default()
    }

    /// Records `overall_score` for `host` and reports a transition only when the
    /// state actually flips.
    pub fn evaluate(&mut self, host: &str, overall_score: u8) -> Option<Transition> {
        let below = overall_score < self.threshold;
        let state = self.states.entry(host.to_string()).or_default();
        match (*state, below) {
            (SuppressionState::Active, true) => {
                *state = SuppressionState::Suppressed;
                Some(Transition::Suppress)
            }
            (SuppressionState::Suppressed, false) => {
                *state = SuppressionState::Active;
                Some(Transition::Restore)
            }
            _ => None,
        }
    }

    /// Drops `host`. A suppressed host yields `Restore` so its resource is not
    /// left switched off.
    pub fn release(&mut self, host: &str) -> Option<Transition> {
        match self.states.remove(host)? {
            SuppressionState::Suppressed => Some(Transition::Restore),
            SuppressionState::Active => None,
        }
    }

    pub fn suppressed(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .states
            .iter()
            .filter(|(_, state)| **state == SuppressionState::Suppressed)
            .map(|(host, _)| host.clone())
            .collect();
        hosts.sort();
        hosts
    }
}

/// Consumes score events and drives `controller`. The policy is shared so other
/// surfaces can read suppression state.
pub fn spawn_policy(
    mut events: broadcast::Receiver<WatchEvent>,
    policy: Shared<HysteresisPolicy>,
    mut controller: Box<dyn ResourceController>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(WatchEvent::ScoreUpdated { host, score }) => {
                    let (transition, threshold) = {
                        let mut policy = policy.lock();
                        (policy.evaluate(&host, score.overall_score), policy.threshold())
                    };
                    match transition {
                        Some(Transition::Suppress) => {
                            info!(
                                "Camera {} score {} < {} - suppressing",
                                host, score.overall_score, threshold
                            );
                            controller.disable(&host, &score);
                        }
                        Some(Transition::Restore) => {
                            info!(
                                "Camera {} score {} >= {} - restoring",
                                host, score.overall_score, threshold
                            );
                            controller.enable(&host, &score);
                        }
                        None => {}
                    }
                }
                Ok(WatchEvent::HostRemoved { host, score }) => {
                    let released = policy.lock().release(&host);
                    if released == Some(Transition::Restore) {
                        info!("Camera {} removed while suppressed - restoring", host);
                        controller.enable(&host, &score);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Suppression policy lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
