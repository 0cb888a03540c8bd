/*!
Scripted prober: replays queued outcomes per address instead of running ping.
*/

use async_trait::async_trait;
use linkwatch_kernel::{ProbeOutcome, Prober, RttSource};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeCall {
    pub address: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
struct Step {
    outcome: ProbeOutcome,
    delay: Duration,
}

#[derive(Debug, Default)]
struct Script {
    steps: HashMap<String, VecDeque<Step>>,
    calls: Vec<ProbeCall>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Clones share the same script, so a test can keep a handle after giving one
/// to the watcher.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProber {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, address: &str, outcome: ProbeOutcome, delay: Duration) -> &Self {
        self.script
            .lock()
            .steps
            .entry(address.to_string())
            .or_default()
            .push_back(Step { outcome, delay });
        self
    }

    pub fn push_reachable(&self, address: &str, rtt_ms: f64) -> &Self {
        self.push(
            address,
            ProbeOutcome::reachable(rtt_ms, RttSource::Summary),
            Duration::ZERO,
        )
    }

    pub fn push_unreachable(&self, address: &str, error: &str) -> &Self {
        self.push(address, ProbeOutcome::unreachable(error), Duration::ZERO)
    }

    pub fn calls(&self) -> Vec<ProbeCall> {
        self.script.lock().calls.clone()
    }

    pub fn calls_for(&self, address: &str) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|c| c.address == address)
            .count()
    }

    /// Highest number of probes observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.script.lock().max_in_flight
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, address: &str, timeout: Duration) -> ProbeOutcome {
        let step = {
            let mut script = self.script.lock();
            script.calls.push(ProbeCall {
                address: address.to_string(),
                timeout,
            });
            script.in_flight += 1;
            script.max_in_flight = script.max_in_flight.max(script.in_flight);
            script.steps.get_mut(address).and_then(|queue| queue.pop_front())
        };

        let outcome = match step {
            Some(step) => {
                if !step.delay.is_zero() {
                    tokio::time::sleep(step.delay).await;
                }
                step.outcome
            }
            None => ProbeOutcome::unreachable("no scripted outcome"),
        };

        self.script.lock().in_flight -= 1;
        ProbeOutcome {
            timestamp: OffsetDateTime::now_utc(),
            ..outcome
        }
    }
}
