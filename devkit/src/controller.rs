use linkwatch_kernel::{HostScoreState, ResourceController};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedAction {
    Disabled { host: String, score: u8 },
    Enabled { host: String, score: u8 },
}

/// Records every call so tests can assert "exactly once" behaviour.
#[derive(Debug, Clone, Default)]
pub struct RecordingController {
    actions: Arc<Mutex<Vec<FeedAction>>>,
}

impl RecordingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<FeedAction> {
        self.actions.lock().clone()
    }
}

impl ResourceController for RecordingController {
    fn disable(&mut self, host: &str, score: &HostScoreState) {
        self.actions.lock().push(FeedAction::Disabled {
            host: host.to_string(),
            score: score.overall_score,
        });
    }

    fn enable(&mut self, host: &str, score: &HostScoreState) {
        self.actions.lock().push(FeedAction::Enabled {
            host: host.to_string(),
            score: score.overall_score,
        });
    }
}
