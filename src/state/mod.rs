//! Persistent supervisor state.
//!
//! State lives in plain files under the state directory so that any `svctl`
//! invocation, with or without a running monitor, sees the same picture:
//! runtime records (PID per service), failure counters, captured exit codes,
//! service logs and the monitor's own record.

mod store;
mod types;

pub use store::StateStore;
pub use types::{MonitorRecord, RuntimeRecord};
