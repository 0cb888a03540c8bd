/*!
Test harness for watcher scenarios

- Watcher wired to a `ScriptedProber`
- Event waits bounded by `tokio::time::timeout`
- Polling helper for effects observed on other tasks
*/

use crate::scripted::ScriptedProber;
use anyhow::{anyhow, bail, Result};
use linkwatch_kernel::{HostScoreState, WatchEvent, WatchSettings, Watcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

pub const DEFAULT_WAIT: Duration = Duration::from_secs(3);

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}

pub struct TestHarness {
    pub watcher: Watcher,
    pub prober: ScriptedProber,
    events: broadcast::Receiver<WatchEvent>,
}

impl TestHarness {
    /// Needs a tokio runtime (spawns the watcher's workers).
    pub fn new() -> Self {
        Self::with_settings(WatchSettings::default())
    }

    pub fn with_settings(settings: WatchSettings) -> Self {
        init_tracing();
        let prober = ScriptedProber::new();
        let watcher = Watcher::new(Arc::new(prober.clone()), settings)
            .unwrap_or_else(|e| panic!("harness settings rejected: {e}"));
        let events = watcher.subscribe();
        Self {
            watcher,
            prober,
            events,
        }
    }

    pub async fn next_event(&mut self) -> Result<WatchEvent> {
        timeout(DEFAULT_WAIT, self.events.recv())
            .await
            .map_err(|_| anyhow!("no watcher event within {:?}", DEFAULT_WAIT))?
            .map_err(|e| anyhow!("event channel: {e}"))
    }

    /// Collects the events of the next correlated outcome for `host`, ending
    /// with its score update.
    pub async fn next_outcome_events(&mut self, host: &str) -> Result<Vec<WatchEvent>> {
        let mut collected = Vec::new();
        loop {
            let event = self.next_event().await?;
            if event.host() != host {
                continue;
            }
            let done = matches!(event, WatchEvent::ScoreUpdated { .. });
            collected.push(event);
            if done {
                return Ok(collected);
            }
        }
    }

    pub async fn wait_for_score(&mut self, host: &str) -> Result<HostScoreState> {
        match self.next_outcome_events(host).await?.pop() {
            Some(WatchEvent::ScoreUpdated { score, .. }) => Ok(score),
            other => bail!("expected a score update for {host}, got {other:?}"),
        }
    }

    /// Runs one cycle and returns the score `host` ends up with.
    pub async fn cycle(&mut self, host: &str) -> Result<HostScoreState> {
        self.watcher.run_cycle();
        self.wait_for_score(host).await
    }

    /// True when no event arrives within `window`.
    pub async fn quiet_for(&mut self, window: Duration) -> bool {
        timeout(window, self.events.recv()).await.is_err()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls `condition` until it holds or `DEFAULT_WAIT` elapses.
pub async fn eventually<F>(mut condition: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + DEFAULT_WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bail!("condition not met within {:?}", DEFAULT_WAIT)
}
