//! Service lifecycle: start, stop, dependency-ordered bulk operations, and
//! the health monitor.
//!
//! [`Supervisor`] implements the operations over the state directory.
//! [`SupervisorActor`] serializes them, and [`run_monitor_loop`] drives the
//! actor on a timer.

mod actor;
mod builder;
mod core;
mod lifecycle;
mod monitoring;
mod orchestration;
mod outcome;
mod status;

pub use actor::{SupervisorActor, SupervisorCommand, SupervisorHandle};
pub use builder::SupervisorBuilder;
pub use core::Supervisor;
pub use lifecycle::read_log_tail;
pub use monitoring::{decide, run_monitor_loop, MonitorAction, MonitorOptions, Observation};
pub use outcome::{
    CleanReport, ProbeResult, RestartAllReport, ServiceFailure, ServiceState, ServiceStatus,
    StartAllReport, StartOutcome, StopAllReport, StopOutcome,
};
