//! Probe execution
//!
//! Handles one reachability check per request:
//! - Spawns the platform ping utility with count/timeout flags
//! - Kills it when it overruns its wait budget
//! - Parses loss and RTT statistics from its output
//! - Runs requests on a small pool of worker tasks, replies go back over a channel

pub mod parse;

use crate::error::ProbeError;
use crate::models::{ProbeOutcome, RequestId, RttSource};
use async_trait::async_trait;
use parse::parse_ping_output;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Extra time granted to the utility on top of its own per-packet timeout.
const WAIT_GRACE: Duration = Duration::from_secs(2);

/// Anything able to measure reachability of an address.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: &str, timeout: Duration) -> ProbeOutcome;
}

#[derive(Debug, Clone)]
pub struct PingSettings {
    pub program: String,
    pub count: u32,
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            program: "ping".to_string(),
            count: 1,
        }
    }
}

/// Shells out to the system `ping`.
#[derive(Debug, Clone, Default)]
pub struct PingExecutor {
    settings: PingSettings,
}

impl PingExecutor {
    pub fn new(settings: PingSettings) -> Self {
        Self { settings }
    }

    /// Platform argument shape: Windows takes the timeout in milliseconds,
    /// unix ping in seconds with one decimal.
    pub fn arguments(&self, address: &str, timeout: Duration) -> Vec<String> {
        let count = self.settings.count.max(1).to_string();
        if cfg!(target_os = "windows") {
            vec![
                "-n".to_string(),
                count,
                "-w".to_string(),
                timeout.as_millis().to_string(),
                address.to_string(),
            ]
        } else {
            vec![
                "-c".to_string(),
                count,
                "-W".to_string(),
                format!("{:.1}", timeout.as_secs_f64()),
                address.to_string(),
            ]
        }
    }

    pub fn wait_budget(&self, timeout: Duration) -> Duration {
        timeout * self.settings.count.max(1) + WAIT_GRACE
    }
}

#[async_trait]
impl Prober for PingExecutor {
    async fn probe(&self, address: &str, timeout: Duration) -> ProbeOutcome {
        let mut command = Command::new(&self.settings.program);
        command.args(self.arguments(address, timeout));

        match run_with_budget(&self.settings.program, command, self.wait_budget(timeout)).await {
            Ok(output) => outcome_from_output(address, &output),
            Err(e) => {
                debug!("Probe of {} failed: {}", address, e);
                ProbeOutcome::unreachable(e.to_string())
            }
        }
    }
}

/// Captured result of a finished probe process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `command` to completion or kills it once `budget` has elapsed.
pub async fn run_with_budget(
    program: &str,
    mut command: Command,
    budget: Duration,
) -> Result<CommandOutput, ProbeError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|source| ProbeError::Launch {
        program: program.to_string(),
        source,
    })?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = tokio::time::timeout(budget, child.wait_with_output())
        .await
        .map_err(|_| ProbeError::Timeout {
            program: program.to_string(),
            budget,
        })?
        .map_err(|source| ProbeError::Wait {
            program: program.to_string(),
            source,
        })?;

    Ok(CommandOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Maps a finished process to an outcome. A clean exit without any parseable
/// RTT is still reported reachable, at 0 ms with `RttSource::Defaulted`.
pub fn outcome_from_output(address: &str, output: &CommandOutput) -> ProbeOutcome {
    if !output.success {
        let mut error = match output.exit_code {
            Some(code) => format!("Ping failed (exit code {code})"),
            None => "Ping failed (terminated by signal)".to_string(),
        };
        if let Some(detail) = output.stderr.lines().find(|l| !l.trim().is_empty()) {
            error.push_str(": ");
            error.push_str(detail.trim());
        }
        return ProbeOutcome::unreachable(error);
    }

    let report = parse_ping_output(&output.stdout);
    match report.rtt() {
        Some((rtt, source)) => ProbeOutcome::reachable(rtt, source),
        None => {
            warn!("No RTT found in ping output for {}, reporting 0 ms", address);
            ProbeOutcome::reachable(0.0, RttSource::Defaulted)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub request_id: RequestId,
    pub host: String,
    pub address: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ProbeReply {
    pub request_id: RequestId,
    pub host: String,
    pub outcome: ProbeOutcome,
}

/// Asked right before a queued request is probed; `false` skips it.
pub type StillWanted = Arc<dyn Fn(&ProbeRequest) -> bool + Send + Sync>;

/// Starts `workers` tasks pulling from one request queue. With a single worker
/// every probe runs strictly after the previous one. Requests `still_wanted`
/// rejects are dropped without running the prober, so a worker that falls
/// behind catches up instead of probing superseded requests.
pub fn spawn_workers(
    prober: Arc<dyn Prober>,
    workers: usize,
    still_wanted: StillWanted,
    replies: mpsc::UnboundedSender<ProbeReply>,
) -> (mpsc::UnboundedSender<ProbeRequest>, Vec<JoinHandle<()>>) {
    let (request_tx, request_rx) = mpsc::unbounded_channel::<ProbeRequest>();
    let queue = Arc::new(AsyncMutex::new(request_rx));

    let handles = (0..workers.max(1))
        .map(|worker| {
            let queue = queue.clone();
            let prober = prober.clone();
            let replies = replies.clone();
            let still_wanted = still_wanted.clone();
            tokio::spawn(async move {
                loop {
                    let next = queue.lock().await.recv().await;
                    let Some(request) = next else { break };
                    if !still_wanted(&request) {
                        debug!(
                            "Worker {} skipping superseded request {} for {}",
                            worker, request.request_id, request.host
                        );
                        continue;
                    }

                    debug!(
                        "Worker {} probing {} ({}) id {}",
                        worker, request.host, request.address, request.request_id
                    );
                    let outcome = prober.probe(&request.address, request.timeout).await;
                    let reply = ProbeReply {
                        request_id: request.request_id,
                        host: request.host,
                        outcome,
                    };
                    if replies.send(reply).is_err() {
                        break;
                    }
                }
                debug!("Probe worker {} stopped", worker);
            })
        })
        .collect();

    (request_tx, handles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(success: bool, code: Option<i32>, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            success,
            exit_code: code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn platform_arguments_and_wait_budget() {
        let executor = PingExecutor::new(PingSettings {
            program: "ping".into(),
            count: 3,
        });
        let args = executor.arguments("192.168.144.25", Duration::from_millis(1500));
        if cfg!(target_os = "windows") {
            assert_eq!(args, ["-n", "3", "-w", "1500", "192.168.144.25"]);
        } else {
            assert_eq!(args, ["-c", "3", "-W", "1.5", "192.168.144.25"]);
        }
        assert_eq!(
            executor.wait_budget(Duration::from_millis(1000)),
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn nonzero_exit_is_unreachable() {
        let outcome = outcome_from_output("10.0.0.9", &output(false, Some(1), "", ""));
        assert!(!outcome.success);
        assert_eq!(outcome.rtt_ms, None);
        assert_eq!(outcome.error.as_deref(), Some("Ping failed (exit code 1)"));
    }

    #[test]
    fn stderr_detail_is_kept() {
        let outcome = outcome_from_output(
            "nowhere",
            &output(false, Some(2), "", "ping: nowhere: Name or service not known\n"),
        );
        assert_eq!(
            outcome.error.as_deref(),
            Some("Ping failed (exit code 2): ping: nowhere: Name or service not known")
        );
    }

    #[test]
    fn clean_exit_without_rtt_defaults_to_zero() {
        let outcome = outcome_from_output("10.0.0.9", &output(true, Some(0), "garbled\n", ""));
        assert!(outcome.success);
        assert_eq!(outcome.rtt_ms, Some(0.0));
        assert_eq!(outcome.rtt_source, RttSource::Defaulted);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn parses_real_process_output() {
        let mut command = Command::new("sh");
        command.args([
            "-c",
            "printf '1 packets transmitted, 1 received, 0%% packet loss, time 0ms\\nrtt min/avg/max/mdev = 7.100/7.100/7.100/0.000 ms\\n'",
        ]);
        let out = run_with_budget("sh", command, Duration::from_secs(5)).await.unwrap();
        assert!(out.success);
        let outcome = outcome_from_output("local", &out);
        assert_eq!(outcome.rtt_ms, Some(7.1));
        assert_eq!(outcome.rtt_source, RttSource::Summary);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn overrunning_process_times_out() {
        let mut command = Command::new("sh");
        command.args(["-c", "sleep 10"]);
        let started = std::time::Instant::now();
        let err = run_with_budget("sh", command, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Timeout { .. }));
        assert!(err.to_string().contains("timed out after 200ms"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_program_is_launch_failure() {
        let executor = PingExecutor::new(PingSettings {
            program: "linkwatch-no-such-ping".into(),
            count: 1,
        });
        let outcome = executor.probe("127.0.0.1", Duration::from_millis(100)).await;
        assert!(!outcome.success);
        assert!(outcome
            .error
            .unwrap()
            .starts_with("Failed to start linkwatch-no-such-ping process"));
    }

    struct FixedProber;

    #[async_trait]
    impl Prober for FixedProber {
        async fn probe(&self, address: &str, _timeout: Duration) -> ProbeOutcome {
            if address == "up" {
                ProbeOutcome::reachable(2.0, RttSource::Summary)
            } else {
                ProbeOutcome::unreachable("down")
            }
        }
    }

    #[tokio::test]
    async fn workers_answer_every_request_with_its_id() {
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        let (requests, _handles) =
            spawn_workers(Arc::new(FixedProber), 1, Arc::new(|_: &ProbeRequest| true), reply_tx);

        for (id, address) in [(1, "up"), (2, "down")] {
            requests
                .send(ProbeRequest {
                    request_id: id,
                    host: format!("host-{id}"),
                    address: address.into(),
                    timeout: Duration::from_millis(50),
                })
                .unwrap();
        }

        let first = reply_rx.recv().await.unwrap();
        let second = reply_rx.recv().await.unwrap();
        assert_eq!((first.request_id, first.outcome.success), (1, true));
        assert_eq!((second.request_id, second.outcome.success), (2, false));
        assert_eq!(second.host, "host-2");
    }

    #[tokio::test]
    async fn unwanted_requests_are_never_probed() {
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        let wanted: StillWanted = Arc::new(|request: &ProbeRequest| request.request_id != 1);
        let (requests, _handles) = spawn_workers(Arc::new(FixedProber), 1, wanted, reply_tx);

        for id in [1, 2] {
            requests
                .send(ProbeRequest {
                    request_id: id,
                    host: "SIYI".into(),
                    address: "up".into(),
                    timeout: Duration::from_millis(50),
                })
                .unwrap();
        }

        let reply = reply_rx.recv().await.unwrap();
        assert_eq!(reply.request_id, 2);
        assert!(reply_rx.try_recv().is_err());
    }
}
