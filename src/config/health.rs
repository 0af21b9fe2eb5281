//! Health check and restart policy configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP liveness endpoint for a service.
///
/// ```yaml
/// health_check:
///   url: "http://127.0.0.1:8080/health"
///   interval: 2          # seconds between startup attempts
///   timeoutSeconds: 5    # bound on a single probe
///   retries: 10          # startup attempts before giving up
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub url: String,

    #[serde(default = "default_interval", alias = "intervalSeconds")]
    pub interval: u64,

    #[serde(default = "default_timeout", alias = "timeoutSeconds", alias = "timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_interval() -> u64 {
    2
}

fn default_timeout() -> u64 {
    5
}

fn default_retries() -> u32 {
    5
}

impl HealthCheck {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            interval: default_interval(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
        }
    }

    /// Delay between startup attempts.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Upper bound on a single probe.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

/// What the monitor does when a service's process is found dead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartMode {
    Always,
    #[serde(alias = "on_failure", alias = "onFailure")]
    OnFailure,
    #[default]
    #[serde(alias = "no")]
    Never,
}

impl std::fmt::Display for RestartMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RestartMode::Always => "always",
            RestartMode::OnFailure => "on-failure",
            RestartMode::Never => "never",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    #[serde(default)]
    pub mode: RestartMode,

    #[serde(default = "default_retry_delay", alias = "retryDelaySeconds")]
    pub retry_delay_seconds: u64,

    /// Cap on consecutive crash relaunches under `on-failure`. Unlimited when unset.
    #[serde(default, alias = "maxRetries")]
    pub max_retries: Option<u32>,
}

fn default_retry_delay() -> u64 {
    5
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            mode: RestartMode::default(),
            retry_delay_seconds: default_retry_delay(),
            max_retries: None,
        }
    }
}

impl RestartPolicy {
    pub fn with_mode(mode: RestartMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    /// Whether the monitor may act on this service at all.
    pub fn restarts(&self) -> bool {
        self.mode != RestartMode::Never
    }

    /// Whether a crashed process should be relaunched.
    ///
    /// `attempts` counts relaunches already made since the service was last
    /// seen healthy. `exit_code` is `None` when the exit status was not captured.
    pub fn should_relaunch(&self, exit_code: Option<i32>, attempts: u32) -> bool {
        match self.mode {
            RestartMode::Never => false,
            RestartMode::Always => true,
            RestartMode::OnFailure => {
                if exit_code == Some(0) {
                    return false;
                }
                self.max_retries.map_or(true, |max| attempts < max)
            }
        }
    }
}
