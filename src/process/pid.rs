use chrono::{DateTime, Utc};

/// Seconds of disagreement tolerated between a recorded start time and the
/// kernel's view before a PID is considered reused.
const START_TIME_TOLERANCE_SECS: f64 = 60.0;

/// Process group of `pid`, if the process exists.
#[cfg(unix)]
pub fn process_group(pid: u32) -> Option<nix::unistd::Pid> {
    let nix_pid = crate::error::validate_pid_for_check(pid)?;
    match nix::unistd::getpgid(Some(nix_pid)) {
        Ok(pgid) if pgid.as_raw() > 0 => Some(pgid),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("getpgid({}) failed: {} (process may have exited)", pid, e);
            None
        }
    }
}

#[cfg(not(unix))]
pub fn process_group(_pid: u32) -> Option<nix::unistd::Pid> {
    None
}

#[cfg(target_os = "linux")]
fn clock_ticks_per_sec() -> f64 {
    nix::unistd::sysconf(nix::unistd::SysconfVar::CLK_TCK)
        .ok()
        .flatten()
        .map(|v| v as f64)
        .unwrap_or(100.0)
}

/// Age in seconds of a live process, from `/proc`.
#[cfg(target_os = "linux")]
fn process_age_secs(pid: u32) -> Option<f64> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    // comm may contain spaces; fields resume after the last ')'
    let rest = stat.get(stat.rfind(')')? + 2..)?;
    let starttime: f64 = rest.split_whitespace().nth(19)?.parse().ok()?;

    let uptime = std::fs::read_to_string("/proc/uptime").ok()?;
    let uptime: f64 = uptime.split_whitespace().next()?.parse().ok()?;

    Some(uptime - starttime / clock_ticks_per_sec())
}

/// Age in seconds of a live process, from `ps -o etime=`.
#[cfg(target_os = "macos")]
fn process_age_secs(pid: u32) -> Option<f64> {
    let output = std::process::Command::new("ps")
        .args(["-o", "etime=", "-p", &pid.to_string()])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_elapsed(String::from_utf8_lossy(&output.stdout).trim()).map(|s| s as f64)
}

/// Parse `ps` elapsed time: `[[dd-]hh:]mm:ss`.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_elapsed(s: &str) -> Option<u64> {
    let (days, clock) = match s.split_once('-') {
        Some((d, rest)) => (d.parse::<u64>().ok()?, rest),
        None => (0, s),
    };
    let mut secs = 0u64;
    for part in clock.split(':') {
        secs = secs * 60 + part.parse::<u64>().ok()?;
    }
    Some(days * 86_400 + secs)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn process_age_secs(_pid: u32) -> Option<f64> {
    None
}

/// Check that `pid` is still the process that was started at `expected_start`.
///
/// Returns false only when the live process is clearly older or younger than
/// the record says, which means the PID was recycled. When the age cannot be
/// read the PID is trusted.
pub fn validate_pid_start_time(pid: u32, expected_start: DateTime<Utc>) -> bool {
    let Some(actual_age) = process_age_secs(pid) else {
        return true;
    };

    let expected_age = Utc::now()
        .signed_duration_since(expected_start)
        .num_milliseconds() as f64
        / 1000.0;

    if (actual_age - expected_age).abs() > START_TIME_TOLERANCE_SECS {
        tracing::warn!(
            "PID {} appears to be reused: process age {:.0}s vs recorded {:.0}s",
            pid,
            actual_age,
            expected_age
        );
        return false;
    }
    true
}
