//! Run `svctl start-all` at login, one strategy per host OS.

mod launchd;
mod systemd;
mod task_scheduler;

pub use launchd::LaunchdAgent;
pub use systemd::SystemdUserUnit;
pub use task_scheduler::TaskSchedulerTask;

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    pub fn current() -> Result<Self> {
        match std::env::consts::OS {
            "linux" => Ok(Platform::Linux),
            "macos" => Ok(Platform::MacOs),
            "windows" => Ok(Platform::Windows),
            other => Err(Error::Autostart(format!(
                "No autostart strategy for '{}'. Pass --platform linux, macos or windows",
                other
            ))),
        }
    }

    pub fn strategy(self) -> Box<dyn AutostartStrategy> {
        match self {
            Platform::Linux => Box::new(SystemdUserUnit),
            Platform::MacOs => Box::new(LaunchdAgent),
            Platform::Windows => Box::new(TaskSchedulerTask),
        }
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linux" | "systemd" => Ok(Platform::Linux),
            "macos" | "darwin" | "osx" | "launchd" => Ok(Platform::MacOs),
            "windows" | "win" | "schtasks" => Ok(Platform::Windows),
            other => Err(Error::Autostart(format!(
                "Unknown platform '{}'. Expected linux, macos or windows",
                other
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
        })
    }
}

/// Paths baked into the generated autostart entry.
#[derive(Debug, Clone)]
pub struct AutostartContext {
    /// The `svctl` binary to run.
    pub exe: PathBuf,
    /// Registry passed with `--config`.
    pub registry: PathBuf,
    pub working_dir: PathBuf,
    pub home: PathBuf,
}

impl AutostartContext {
    /// Context for the running binary and the given registry.
    pub fn for_registry(registry: &Path) -> Result<Self> {
        let exe = std::env::current_exe()
            .and_then(|p| p.canonicalize())
            .map_err(|e| Error::Autostart(format!("Cannot resolve svctl binary: {}", e)))?;
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Autostart("Cannot determine home directory".to_string()))?;
        let registry = registry
            .canonicalize()
            .unwrap_or_else(|_| registry.to_path_buf());
        let working_dir = registry
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| home.clone());
        Ok(Self {
            exe,
            registry,
            working_dir,
            home,
        })
    }
}

pub trait AutostartStrategy {
    fn platform(&self) -> Platform;

    /// The generated entry: a unit file, a plist, or a task command line.
    fn render(&self, ctx: &AutostartContext) -> String;

    /// Where [`render`](Self::render)'s output is written. `None` when the
    /// entry is registered by command only.
    fn target_path(&self, ctx: &AutostartContext) -> Option<PathBuf>;

    /// Commands that register the entry with the OS.
    fn activation(&self, ctx: &AutostartContext) -> Vec<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct InstallReport {
    pub platform: Platform,
    pub path: Option<PathBuf>,
    /// False when an activation command failed; the entry is still written.
    pub activated: bool,
    pub warnings: Vec<String>,
}

/// Write and register the autostart entry for `platform`.
pub fn install_autostart(platform: Platform, ctx: &AutostartContext) -> Result<InstallReport> {
    let strategy = platform.strategy();
    tracing::debug!("Installing autostart entry for {}", strategy.platform());
    let path = write_entry(strategy.as_ref(), ctx)?;
    let warnings = activate(strategy.as_ref(), ctx);

    Ok(InstallReport {
        platform,
        path,
        activated: warnings.is_empty(),
        warnings,
    })
}

/// Render the entry and write it to the strategy's target path, if any.
pub fn write_entry(
    strategy: &dyn AutostartStrategy,
    ctx: &AutostartContext,
) -> Result<Option<PathBuf>> {
    let Some(path) = strategy.target_path(ctx) else {
        return Ok(None);
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::Autostart(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    std::fs::write(&path, strategy.render(ctx))
        .map_err(|e| Error::Autostart(format!("Failed to write {}: {}", path.display(), e)))?;
    tracing::info!("Wrote {}", path.display());
    Ok(Some(path))
}

/// Run the strategy's activation commands. Failures are returned as warnings.
fn activate(strategy: &dyn AutostartStrategy, ctx: &AutostartContext) -> Vec<String> {
    let mut warnings = Vec::new();
    for argv in strategy.activation(ctx) {
        let Some((program, args)) = argv.split_first() else {
            continue;
        };
        match Command::new(program).args(args).status() {
            Ok(status) if status.success() => {}
            Ok(status) => warnings.push(format!("`{}` exited with {}", argv.join(" "), status)),
            Err(e) => warnings.push(format!("`{}` could not run: {}", argv.join(" "), e)),
        }
    }
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    warnings
}

pub(crate) fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
