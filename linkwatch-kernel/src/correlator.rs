//! Request correlation: every dispatched probe gets a fresh id, only the newest
//! id per host is honoured when replies come back.

use crate::models::{HostEntry, RequestId};
use crate::state::HostRegistry;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
pub struct Correlator {
    last_id: AtomicU64,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next id and makes it the host's pending request,
    /// superseding whatever was outstanding.
    pub fn issue(&self, entry: &mut HostEntry) -> RequestId {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = entry.pending.replace(id) {
            debug!("Request {} for {} superseded by {}", previous, entry.name, id);
        }
        id
    }

    /// Finds the host still waiting on `request_id` and clears its pending id.
    /// `None` means the reply is stale or its host is gone.
    pub fn claim<'a>(
        &self,
        hosts: &'a mut HostRegistry,
        request_id: RequestId,
    ) -> Option<&'a mut HostEntry> {
        let entry = hosts
            .values_mut()
            .find(|entry| entry.pending == Some(request_id))?;
        entry.pending = None;
        Some(entry)
    }

    /// True while `request_id` is still the pending request of `host`.
    pub fn is_pending(&self, hosts: &HostRegistry, host: &str, request_id: RequestId) -> bool {
        hosts
            .get(host)
            .is_some_and(|entry| entry.pending == Some(request_id))
    }

    pub fn last_issued(&self) -> RequestId {
        self.last_id.load(Ordering::SeqCst)
    }
}
