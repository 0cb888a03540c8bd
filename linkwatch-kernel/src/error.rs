use std::time::Duration;

/// Failures inside the probe executor. Never leave the executor: they are folded
/// into a failed `ProbeOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Failed to start {program} process: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} process timed out after {ms}ms", ms = .budget.as_millis())]
    Timeout { program: String, budget: Duration },
    #[error("Failed to collect {program} output: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Ping interval must be greater than zero")]
    ZeroInterval,
    #[error("Probe timeout must be greater than zero")]
    ZeroTimeout,
    #[error("Probe workers are gone")]
    WorkersClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
