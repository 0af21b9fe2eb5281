//! # svc-supervisor
//!
//! Keeps a registry of long-running local services alive.
//!
//! ## Features
//!
//! - **Dependency-ordered startup**: `start_all` launches services in passes
//!   until every dependency is up, reporting cycles and missing services as failures
//! - **Graceful shutdown**: SIGTERM to the process group, SIGKILL after a grace period
//! - **Health monitoring**: HTTP probes, restart after repeated failures, crash relaunch
//!   per restart policy
//! - **Port clearing**: processes squatting on a service's ports are terminated first
//! - **Durable state**: runtime records on disk, so separate CLI invocations agree
//! - **Autostart and snapshots**: systemd, launchd or Task Scheduler entries, and
//!   timestamped state archives
//!
//! ## Quick Start
//!
//! ```no_run
//! use svc_supervisor::{Parser, Supervisor, SupervisorActor};
//!
//! # async fn example() -> Result<(), svc_supervisor::Error> {
//! let parser = Parser::new();
//! let registry = parser.load_registry("services.yaml")?;
//!
//! let supervisor = Supervisor::builder().registry(registry).build()?;
//! let (handle, _task) = SupervisorActor::spawn(supervisor)?;
//!
//! let report = handle.start_all().await?;
//! println!("started: {:?}, failed: {:?}", report.started, report.failed_names());
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! All state-changing operations go through one [`SupervisorActor`] and its
//! command queue. The monitor loop and the control socket are clients of that
//! queue like any CLI command.

pub mod autostart;
pub mod backup;
pub mod config;
pub mod control;
pub mod daemon;
pub mod dependency;
pub mod error;
pub mod healthcheck;
pub mod port;
pub mod process;
pub mod state;
pub mod supervisor;

pub use config::{Parser, Registry, RestartMode, RestartPolicy, ServiceDefinition, Settings};
pub use error::{Error, Result};
pub use state::StateStore;
pub use supervisor::{
    StartAllReport, StartOutcome, StopOutcome, Supervisor, SupervisorActor, SupervisorHandle,
};
