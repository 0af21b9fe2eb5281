//! Supervisor-wide tunables from the optional `supervisor:` block.
//!
//! Precedence, highest first: CLI flags, `SVCTL_*` environment variables,
//! the registry file, built-in defaults.

use super::{format_duration, parse_duration_string};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const STATE_DIR_ENV: &str = "SVCTL_STATE_DIR";
pub const GRACE_PERIOD_ENV: &str = "SVCTL_GRACE_PERIOD";
pub const MONITOR_INTERVAL_ENV: &str = "SVCTL_MONITOR_INTERVAL";

const DEFAULT_STATE_DIR: &str = ".svctl";

/// The `supervisor:` block as written in YAML. Durations stay strings here
/// and are parsed by [`Settings::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    #[serde(alias = "stateDir")]
    pub state_dir: Option<PathBuf>,
    #[serde(alias = "gracePeriod")]
    pub grace_period: Option<String>,
    #[serde(alias = "monitorInterval")]
    pub monitor_interval: Option<String>,
    #[serde(alias = "failureThreshold")]
    pub failure_threshold: Option<u32>,
    #[serde(alias = "settleWindow")]
    pub settle_window: Option<String>,
    #[serde(alias = "portClearWait")]
    pub port_clear_wait: Option<String>,
    #[serde(alias = "backupDir")]
    pub backup_dir: Option<PathBuf>,
    #[serde(alias = "backupRetentionDays")]
    pub backup_retention_days: Option<u32>,
    #[serde(alias = "backupInterval")]
    pub backup_interval: Option<String>,
    #[serde(alias = "logTailLines")]
    pub log_tail_lines: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub state_dir: PathBuf,
    /// SIGTERM-to-SIGKILL window for `stop`.
    pub grace_period: Duration,
    pub monitor_interval: Duration,
    /// Consecutive failed probes before the monitor restarts a service.
    pub failure_threshold: u32,
    /// How long a freshly spawned process must survive to count as launched.
    pub settle_window: Duration,
    /// Pause after clearing a port before re-checking it.
    pub port_clear_wait: Duration,
    pub backup_dir: PathBuf,
    pub backup_retention_days: u32,
    /// Periodic snapshot cadence for the monitor. `None` disables it.
    pub backup_interval: Option<Duration>,
    pub log_tail_lines: usize,
}

impl Settings {
    /// Built-in defaults rooted at `base_dir`.
    pub fn defaults(base_dir: &Path) -> Self {
        let state_dir = base_dir.join(DEFAULT_STATE_DIR);
        Self {
            backup_dir: state_dir.join("backups"),
            state_dir,
            grace_period: Duration::from_secs(10),
            monitor_interval: Duration::from_secs(30),
            failure_threshold: 3,
            settle_window: Duration::from_secs(1),
            port_clear_wait: Duration::from_secs(1),
            backup_retention_days: 7,
            backup_interval: None,
            log_tail_lines: 200,
        }
    }

    /// Layer the file block over the defaults. Relative paths are taken from
    /// `base_dir`, the registry file's directory.
    pub fn resolve(raw: &RawSettings, base_dir: &Path) -> Result<Self> {
        let mut settings = Self::defaults(base_dir);

        if let Some(dir) = &raw.state_dir {
            settings.set_state_dir(absolutize(dir, base_dir));
        }
        if let Some(v) = &raw.grace_period {
            settings.grace_period = parse_setting("grace_period", v)?;
        }
        if let Some(v) = &raw.monitor_interval {
            settings.monitor_interval = parse_setting("monitor_interval", v)?;
        }
        if let Some(v) = raw.failure_threshold {
            settings.failure_threshold = v;
        }
        if let Some(v) = &raw.settle_window {
            settings.settle_window = parse_setting("settle_window", v)?;
        }
        if let Some(v) = &raw.port_clear_wait {
            settings.port_clear_wait = parse_setting("port_clear_wait", v)?;
        }
        if let Some(dir) = &raw.backup_dir {
            settings.backup_dir = absolutize(dir, base_dir);
        }
        if let Some(v) = raw.backup_retention_days {
            settings.backup_retention_days = v;
        }
        if let Some(v) = &raw.backup_interval {
            settings.backup_interval = Some(parse_setting("backup_interval", v)?);
        }
        if let Some(v) = raw.log_tail_lines {
            settings.log_tail_lines = v;
        }

        if settings.failure_threshold == 0 {
            return Err(Error::Validation(
                "supervisor.failure_threshold must be at least 1".to_string(),
            ));
        }
        if settings.monitor_interval.is_zero() {
            return Err(Error::Validation(
                "supervisor.monitor_interval must be greater than zero".to_string(),
            ));
        }

        Ok(settings)
    }

    /// Apply `SVCTL_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with an injectable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(STATE_DIR_ENV).filter(|s| !s.is_empty()) {
            self.set_state_dir(PathBuf::from(dir));
        }
        if let Some(v) = lookup(GRACE_PERIOD_ENV) {
            self.grace_period = parse_setting(GRACE_PERIOD_ENV, &v)?;
        }
        if let Some(v) = lookup(MONITOR_INTERVAL_ENV) {
            self.monitor_interval = parse_setting(MONITOR_INTERVAL_ENV, &v)?;
        }
        Ok(())
    }

    /// Move the state directory. A backup dir still at its default location
    /// moves along with it.
    pub fn set_state_dir(&mut self, dir: PathBuf) {
        if self.backup_dir == self.state_dir.join("backups") {
            self.backup_dir = dir.join("backups");
        }
        self.state_dir = dir;
    }

    pub fn backup_retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.backup_retention_days) * 24 * 60 * 60)
    }

    /// One-line summary for `svctl validate`.
    pub fn describe(&self) -> String {
        format!(
            "state_dir={} grace_period={} monitor_interval={} failure_threshold={}",
            self.state_dir.display(),
            format_duration(self.grace_period),
            format_duration(self.monitor_interval),
            self.failure_threshold
        )
    }
}

fn parse_setting(name: &str, value: &str) -> Result<Duration> {
    parse_duration_string(value).ok_or_else(|| {
        Error::Config(format!(
            "Invalid duration for {}: '{}' (expected e.g. \"10s\", \"500ms\", \"1m\")",
            name, value
        ))
    })
}

fn absolutize(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
