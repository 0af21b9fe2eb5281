// thiserror's generated Display for struct variants trips unused_assignments
// on some toolchains even though every field is read.
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(svctl::config::validation),
        help("Run `svctl validate` for detailed validation errors")
    )]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Process error: {0}")]
    #[diagnostic(
        code(svctl::process::error),
        help("Check that the command exists and is executable")
    )]
    Process(String),

    #[error("Filesystem error: {0}")]
    #[diagnostic(code(svctl::filesystem::error))]
    Filesystem(String),

    #[error("Service not found: {0}")]
    #[diagnostic(
        code(svctl::service::not_found),
        help("List registered services with `svctl status`")
    )]
    ServiceNotFound(String),

    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    #[diagnostic(
        code(svctl::dependency::circular),
        help("Services cannot depend on each other in a cycle. Review the dependencies fields")
    )]
    CircularDependency(Vec<String>),

    #[error("Port {port} is in use{}",
        .process_name.as_ref()
            .zip(.pid.as_ref())
            .map(|(name, pid)| format!(" by process '{}' (PID {})", name, pid))
            .unwrap_or_default()
    )]
    #[diagnostic(
        code(svctl::port::conflict),
        help("Find what's using the port with: lsof -i :{port}")
    )]
    PortConflict {
        port: u16,
        pid: Option<u32>,
        process_name: Option<String>,
    },

    #[error("Service '{name}' did not stop: {reason}")]
    #[diagnostic(code(svctl::service::stop_failed))]
    StopFailed { name: String, reason: String },

    #[error("Invalid PID {pid}: {reason}")]
    InvalidPid { pid: u32, reason: String },

    #[error("A monitor is already running (PID {pid})")]
    #[diagnostic(
        code(svctl::monitor::running),
        help("Stop the existing monitor first, or run `svctl clean` if it crashed")
    )]
    MonitorAlreadyRunning { pid: u32 },

    #[error("Supervisor is not accepting commands")]
    SupervisorUnavailable,

    #[error("Control socket error: {0}")]
    #[diagnostic(code(svctl::control::error))]
    Control(String),

    #[error("Autostart error: {0}")]
    #[diagnostic(code(svctl::autostart::error))]
    Autostart(String),

    #[error("Backup error: {0}")]
    #[diagnostic(
        code(svctl::backup::error),
        help("Check that `tar` is installed and the backup directory is writable")
    )]
    Backup(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::ServiceNotFound(name) => Some(format!(
                "'{}' is not in the registry. Check `svctl status` for registered services.",
                name
            )),
            Error::PortConflict {
                port,
                pid,
                process_name,
            } => {
                let kill_hint = match (pid, process_name) {
                    (Some(p), Some(name)) => {
                        format!("Stop '{}' (PID {}) or change the service's ports.", name, p)
                    }
                    (Some(p), None) => format!("Kill PID {} or change the service's ports.", p),
                    _ => "Free the port or change the service's ports.".to_string(),
                };
                Some(format!("Port {} could not be cleared. {}", port, kill_hint))
            }
            Error::CircularDependency(path) => Some(format!(
                "Review the dependencies fields for: {}",
                path.join(", ")
            )),
            Error::StopFailed { name, .. } => Some(format!(
                "The process may be stuck in uninterruptible sleep. Retry with: svctl stop --force {}",
                name
            )),
            Error::MonitorAlreadyRunning { .. } => {
                Some("Only one monitor may run per state directory.".to_string())
            }
            Error::SupervisorUnavailable | Error::Control(_) => Some(
                "The monitor may have exited. Remove stale state with: svctl clean".to_string(),
            ),
            Error::Config(msg) if msg.contains("Could not find") => None,
            Error::Config(_) | Error::Validation(_) | Error::Parse(_) => {
                Some("Validate your registry with: svctl validate".to_string())
            }
            Error::Process(_) => Some("Check that the command exists and is executable".to_string()),
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}

/// Converts a recorded PID into a signal target.
///
/// Rejects PID 0 (the caller's own process group), PID 1 (init) and values
/// that do not fit in `pid_t`.
pub fn validate_pid(pid: u32, service_name: &str) -> Result<nix::unistd::Pid> {
    let reason = match pid {
        0 => "PID 0 addresses the caller's process group",
        1 => "refusing to signal init",
        p if p > i32::MAX as u32 => "PID does not fit in pid_t",
        _ => return Ok(nix::unistd::Pid::from_raw(pid as i32)),
    };
    Err(Error::InvalidPid {
        pid,
        reason: format!("{} (service '{}')", reason, service_name),
    })
}

/// Like [`validate_pid`] but for read-only existence probes, where PID 1 is fine.
pub fn validate_pid_for_check(pid: u32) -> Option<nix::unistd::Pid> {
    if pid == 0 || pid > i32::MAX as u32 {
        return None;
    }
    Some(nix::unistd::Pid::from_raw(pid as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_pid_rejects_reserved_values() {
        assert!(validate_pid(0, "api").is_err());
        assert!(validate_pid(1, "api").is_err());
        assert!(validate_pid(u32::MAX, "api").is_err());
        assert_eq!(validate_pid(4242, "api").unwrap().as_raw(), 4242);
    }

    #[test]
    fn check_variant_allows_init() {
        assert!(validate_pid_for_check(1).is_some());
        assert!(validate_pid_for_check(0).is_none());
    }

    #[test]
    fn port_conflict_message_names_the_holder() {
        let err = Error::PortConflict {
            port: 8080,
            pid: Some(77),
            process_name: Some("node".into()),
        };
        assert_eq!(err.to_string(), "Port 8080 is in use by process 'node' (PID 77)");
        assert!(err.with_suggestion().contains("Hint:"));
    }
}
