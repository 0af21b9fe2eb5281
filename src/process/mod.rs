//! OS process control behind a trait.
//!
//! The supervisor only talks to processes through [`ProcessBackend`], so the
//! lifecycle logic can be driven by an in-memory fake in tests.

mod pid;
mod unix;

pub use pid::{process_group, validate_pid_start_time};
pub use unix::UnixProcessBackend;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;

/// Environment variable carrying the service name into the spawned process.
pub const SERVICE_NAME_ENV: &str = "SVCTL_SERVICE";

/// Everything needed to launch one service detached from the supervisor.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub name: String,
    pub command: String,
    pub working_dir: PathBuf,
    /// Merged over the supervisor's own environment.
    pub environment: HashMap<String, String>,
    /// stdout and stderr are appended here.
    pub log_path: PathBuf,
    /// The wrapper writes the command's exit status here when it returns.
    pub exit_file: PathBuf,
}

#[async_trait]
pub trait ProcessBackend: Send + Sync {
    /// Launch the command detached and return the PID to record.
    async fn spawn(&self, request: &SpawnRequest) -> Result<u32>;

    /// Whether a process with this PID currently exists.
    fn is_alive(&self, pid: u32) -> bool;

    /// False when the PID is alive but clearly belongs to a newer process.
    fn matches_start_time(&self, _pid: u32, _started_at: DateTime<Utc>) -> bool {
        true
    }

    /// Ask the process (group) to exit.
    fn terminate(&self, name: &str, pid: u32) -> Result<()>;

    /// Force the process (group) to exit.
    fn kill(&self, name: &str, pid: u32) -> Result<()>;
}
