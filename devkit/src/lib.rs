/*!
# LinkWatch DevKit - stubs and helpers for watcher tests

- Scripted prober: per-address queue of outcomes, optional delays, call log
- Recording controller: captures suppress/restore actions
- Canned ping outputs for parser and executor tests
- Test harness: a watcher wired to the scripted prober plus event waits
*/

pub mod controller;
pub mod fixtures;
pub mod scripted;
pub mod test_utils;

pub use controller::{FeedAction, RecordingController};
pub use scripted::{ProbeCall, ScriptedProber};
pub use test_utils::{init_tracing, TestHarness};
