//! Fixed-interval tick source for the watcher.
//!
//! `Idle -> Watching -> Idle`. The first tick fires one period after start; a new
//! period takes effect immediately by restarting the interval.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

#[derive(Debug)]
enum Control {
    Period(Duration),
    Stop,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    control: Option<mpsc::UnboundedSender<Control>>,
    task: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Starts ticking. Returns `false` if already running.
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, period: Duration, on_tick: F) -> bool
    where
        F: Fn() + Send + 'static,
    {
        if self.is_running() {
            return false;
        }
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        self.control = Some(control_tx);
        self.task = Some(tokio::spawn(run(period, control_rx, on_tick)));
        true
    }

    pub fn set_period(&self, period: Duration) {
        if let Some(control) = &self.control {
            let _ = control.send(Control::Period(period));
        }
    }

    pub fn stop(&mut self) {
        if let Some(control) = self.control.take() {
            let _ = control.send(Control::Stop);
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run<F>(period: Duration, mut control: mpsc::UnboundedReceiver<Control>, on_tick: F)
where
    F: Fn(),
{
    let mut interval = ticker(period);
    loop {
        tokio::select! {
            _ = interval.tick() => on_tick(),
            command = control.recv() => match command {
                Some(Control::Period(period)) => {
                    debug!("Tick period changed to {}ms", period.as_millis());
                    interval = ticker(period);
                }
                Some(Control::Stop) | None => break,
            },
        }
    }
}
