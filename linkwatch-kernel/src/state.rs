use crate::models::HostEntry;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

/// Hosts keyed by name. Ordered so listings and tick dispatch are stable.
pub type HostRegistry = BTreeMap<String, HostEntry>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}
