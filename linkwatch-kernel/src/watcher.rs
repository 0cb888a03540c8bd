//! Continuous connectivity watcher
//!
//! Owns the host registry and wires scheduler -> correlator -> probe workers ->
//! score model. Consumers read scores with [`Watcher::score`] and follow changes
//! through [`Watcher::subscribe`].

use crate::correlator::Correlator;
use crate::error::WatchError;
use crate::models::{HostEntry, HostScoreState, WatchEvent};
use crate::probe::{spawn_workers, ProbeReply, ProbeRequest, Prober, StillWanted};
use crate::scheduler::Scheduler;
use crate::score;
use crate::state::{new_state, HostRegistry, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;
const UNREACHABLE_MESSAGE: &str = "Host unreachable";

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub ping_interval: Duration,
    pub timeout: Duration,
    /// Probe workers sharing the request queue; 1 keeps probes sequential.
    pub workers: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_millis(3000),
            timeout: Duration::from_millis(1000),
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WatchStats {
    pub watching: bool,
    pub hosts_tracked: usize,
    pub probes_dispatched: u64,
    pub replies_applied: u64,
    pub stale_replies_dropped: u64,
    /// Queued requests superseded before a worker reached them.
    pub superseded_skipped: u64,
}

/// Cheap to clone; all clones drive the same registry and workers.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<Inner>,
}

struct Inner {
    core: Arc<Core>,
    ping_interval: Mutex<Duration>,
    timeout: Mutex<Duration>,
    scheduler: Mutex<Scheduler>,
    requests: mpsc::UnboundedSender<ProbeRequest>,
    tasks: Vec<JoinHandle<()>>,
}

/// State shared with the reply loop.
struct Core {
    hosts: Shared<HostRegistry>,
    correlator: Correlator,
    events: broadcast::Sender<WatchEvent>,
    /// Taken before the registry lock is released so events go out in
    /// registry order.
    publish: Mutex<()>,
    dispatched: AtomicU64,
    applied: AtomicU64,
    stale: AtomicU64,
    skipped: AtomicU64,
}

impl Watcher {
    /// Spawns the probe workers and the reply loop; needs a tokio runtime.
    pub fn new(prober: Arc<dyn Prober>, settings: WatchSettings) -> Result<Self, WatchError> {
        validate_interval(settings.ping_interval)?;
        validate_timeout(settings.timeout)?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let core = Arc::new(Core {
            hosts: new_state(HostRegistry::new()),
            correlator: Correlator::new(),
            events,
            publish: Mutex::new(()),
            dispatched: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            stale: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        });

        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let wanted_core = core.clone();
        let still_wanted: StillWanted = Arc::new(move |request: &ProbeRequest| {
            let hosts = wanted_core.hosts.lock();
            let wanted = wanted_core
                .correlator
                .is_pending(&hosts, &request.host, request.request_id);
            if !wanted {
                wanted_core.skipped.fetch_add(1, Ordering::Relaxed);
            }
            wanted
        });
        let (requests, mut tasks) =
            spawn_workers(prober, settings.workers, still_wanted, reply_tx);
        tasks.push(tokio::spawn(reply_loop(core.clone(), reply_rx)));

        info!(
            "Watcher ready ({} probe worker(s), interval {}ms, timeout {}ms)",
            settings.workers.max(1),
            settings.ping_interval.as_millis(),
            settings.timeout.as_millis()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                core,
                ping_interval: Mutex::new(settings.ping_interval),
                timeout: Mutex::new(settings.timeout),
                scheduler: Mutex::new(Scheduler::new()),
                requests,
                tasks,
            }),
        })
    }

    /// Registers a host, or resets its statistics if the name is already known.
    /// Any probe still in flight for it is dropped on arrival.
    pub fn add_host(&self, name: &str, address: &str) {
        let replaced = self
            .inner
            .core
            .hosts
            .lock()
            .insert(name.to_string(), HostEntry::new(name, address))
            .is_some();
        if replaced {
            info!("Host {} reset at {}", name, address);
        } else {
            info!("Added host {} at {}", name, address);
        }
    }

    /// Deregisters `name`. Subscribers get a `HostRemoved` event carrying its
    /// last score.
    pub fn remove_host(&self, name: &str) -> bool {
        let core = &self.inner.core;
        let mut hosts = core.hosts.lock();
        let Some(entry) = hosts.remove(name) else {
            return false;
        };
        let _publish = core.publish.lock();
        drop(hosts);

        info!("Removed host {}", name);
        let _ = core.events.send(WatchEvent::HostRemoved {
            host: entry.name,
            score: entry.score,
        });
        true
    }

    pub fn set_ping_interval(&self, interval: Duration) -> Result<(), WatchError> {
        validate_interval(interval)?;
        *self.inner.ping_interval.lock() = interval;
        let scheduler = self.inner.scheduler.lock();
        if scheduler.is_running() {
            scheduler.set_period(interval);
        }
        Ok(())
    }

    /// Applies from the next tick on.
    pub fn set_timeout(&self, timeout: Duration) -> Result<(), WatchError> {
        validate_timeout(timeout)?;
        *self.inner.timeout.lock() = timeout;
        Ok(())
    }

    pub fn ping_interval(&self) -> Duration {
        *self.inner.ping_interval.lock()
    }

    pub fn timeout(&self) -> Duration {
        *self.inner.timeout.lock()
    }

    pub fn start_watching(&self) {
        let period = self.ping_interval();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let started = self.inner.scheduler.lock().start(period, move || {
            if let Some(inner) = weak.upgrade() {
                inner.run_cycle();
            }
        });
        if started {
            info!("Started watching (every {}ms)", period.as_millis());
        }
    }

    pub fn stop_watching(&self) {
        let mut scheduler = self.inner.scheduler.lock();
        if scheduler.is_running() {
            scheduler.stop();
            info!("Stopped watching");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.inner.scheduler.lock().is_running()
    }

    /// One tick: issues a probe for every registered host without waiting for
    /// earlier ones. Returns how many probes were queued.
    pub fn run_cycle(&self) -> usize {
        self.inner.run_cycle()
    }

    /// Current state of `name`; the empty default when the host is unknown.
    pub fn score(&self, name: &str) -> HostScoreState {
        self.try_score(name).unwrap_or_default()
    }

    pub fn try_score(&self, name: &str) -> Option<HostScoreState> {
        self.inner
            .core
            .hosts
            .lock()
            .get(name)
            .map(|entry| entry.score.clone())
    }

    /// Every registered host, ordered by name.
    pub fn hosts(&self) -> Vec<HostScoreState> {
        self.inner
            .core
            .hosts
            .lock()
            .values()
            .map(|entry| entry.score.clone())
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.inner.core.events.subscribe()
    }

    pub fn stats(&self) -> WatchStats {
        let core = &self.inner.core;
        WatchStats {
            watching: self.is_watching(),
            hosts_tracked: core.hosts.lock().len(),
            probes_dispatched: core.dispatched.load(Ordering::Relaxed),
            replies_applied: core.applied.load(Ordering::Relaxed),
            stale_replies_dropped: core.stale.load(Ordering::Relaxed),
            superseded_skipped: core.skipped.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    fn run_cycle(&self) -> usize {
        let timeout = *self.timeout.lock();
        let batch: Vec<ProbeRequest> = {
            let mut hosts = self.core.hosts.lock();
            hosts
                .values_mut()
                .map(|entry| ProbeRequest {
                    request_id: self.core.correlator.issue(entry),
                    host: entry.name.clone(),
                    address: entry.address.clone(),
                    timeout,
                })
                .collect()
        };

        let mut queued = 0;
        for request in batch {
            debug!("Queued probe for {} with id {}", request.host, request.request_id);
            if self.requests.send(request).is_err() {
                warn!("{}", WatchError::WorkersClosed);
                break;
            }
            queued += 1;
        }
        self.core.dispatched.fetch_add(queued as u64, Ordering::Relaxed);
        queued
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.scheduler.get_mut().stop();
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Core {
    fn apply_reply(&self, reply: ProbeReply) {
        let ProbeReply {
            request_id,
            host,
            outcome,
        } = reply;

        let (events, _publish) = {
            let mut hosts = self.hosts.lock();
            let Some(entry) = self.correlator.claim(&mut hosts, request_id) else {
                self.stale.fetch_add(1, Ordering::Relaxed);
                debug!("Dropped stale reply {} for {}", request_id, host);
                return;
            };

            let edge = entry.last_reachable != outcome.success;
            entry.last_reachable = outcome.success;
            score::apply(&mut entry.score, &outcome);

            let mut events = Vec::with_capacity(3);
            events.push(WatchEvent::StatusChanged {
                host: entry.name.clone(),
                reachable: outcome.success,
                rtt_ms: outcome.rtt_ms,
            });
            if edge {
                info!(
                    "{} status: {} RTT: {}",
                    entry.name,
                    if outcome.success { "REACHABLE" } else { "UNREACHABLE" },
                    outcome.rtt_ms.map_or_else(|| "n/a".to_string(), |rtt| format!("{rtt:.1}ms"))
                );
                let message = if outcome.success {
                    String::new()
                } else {
                    outcome
                        .error
                        .clone()
                        .unwrap_or_else(|| UNREACHABLE_MESSAGE.to_string())
                };
                events.push(WatchEvent::Error {
                    host: entry.name.clone(),
                    message,
                });
            }
            debug!(
                "Probe result for {}: {} id {} score {}",
                entry.name,
                if outcome.success { "SUCCESS" } else { "FAILED" },
                request_id,
                entry.score.overall_score
            );
            events.push(WatchEvent::ScoreUpdated {
                host: entry.name.clone(),
                score: entry.score.clone(),
            });
            (events, self.publish.lock())
        };

        self.applied.fetch_add(1, Ordering::Relaxed);
        for event in events {
            // no subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

async fn reply_loop(core: Arc<Core>, mut replies: mpsc::UnboundedReceiver<ProbeReply>) {
    while let Some(reply) = replies.recv().await {
        core.apply_reply(reply);
    }
}

fn validate_interval(interval: Duration) -> Result<(), WatchError> {
    if interval.is_zero() {
        return Err(WatchError::ZeroInterval);
    }
    Ok(())
}

fn validate_timeout(timeout: Duration) -> Result<(), WatchError> {
    if timeout.is_zero() {
        return Err(WatchError::ZeroTimeout);
    }
    Ok(())
}
