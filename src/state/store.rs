use super::{MonitorRecord, RuntimeRecord};
use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const RUN_DIR: &str = "run";
const FAILURES_DIR: &str = "failures";
const LOGS_DIR: &str = "logs";
const MONITOR_FILE: &str = "monitor.json";
const MONITOR_LOCK_FILE: &str = "monitor.lock";
const SOCKET_FILE: &str = "svctl.sock";

/// File-backed supervisor state under a single directory.
///
/// ```text
/// <state_dir>/
///   run/<name>.json         runtime record
///   run/<name>.exit         exit status written by the launch wrapper
///   failures/<name>.count   consecutive failed probes
///   logs/<name>.log         service stdout+stderr
///   monitor.json            running monitor
///   svctl.sock              monitor control socket
/// ```
///
/// Every read goes to disk, so separate `svctl` invocations agree on what
/// is running.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open the store, creating its directory layout if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(root);
        store.ensure_layout()?;
        Ok(store)
    }

    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [RUN_DIR, FAILURES_DIR, LOGS_DIR] {
            let path = self.root.join(dir);
            fs::create_dir_all(&path).map_err(|e| {
                Error::Filesystem(format!("Failed to create {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.root.join(RUN_DIR).join(format!("{}.json", name))
    }

    pub fn exit_file_path(&self, name: &str) -> PathBuf {
        self.root.join(RUN_DIR).join(format!("{}.exit", name))
    }

    fn failure_path(&self, name: &str) -> PathBuf {
        self.root.join(FAILURES_DIR).join(format!("{}.count", name))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    pub fn log_path(&self, name: &str) -> PathBuf {
        self.logs_dir().join(format!("{}.log", name))
    }

    pub fn socket_path(&self) -> PathBuf {
        self.root.join(SOCKET_FILE)
    }

    pub fn monitor_lock_path(&self) -> PathBuf {
        self.root.join(MONITOR_LOCK_FILE)
    }

    // ── runtime records ────────────────────────────────────────────────

    pub fn read_record(&self, name: &str) -> Result<Option<RuntimeRecord>> {
        read_json(&self.record_path(name))
    }

    pub fn write_record(&self, record: &RuntimeRecord) -> Result<()> {
        let contents = serde_json::to_string_pretty(record)?;
        atomic_write(&self.record_path(&record.name), &contents)
    }

    pub fn remove_record(&self, name: &str) -> Result<()> {
        remove_if_exists(&self.record_path(name))
    }

    /// All records on disk, in name order. Unreadable files are skipped.
    pub fn list_records(&self) -> Result<Vec<RuntimeRecord>> {
        let dir = self.root.join(RUN_DIR);
        let mut records = Vec::new();
        for name in file_stems(&dir, "json")? {
            match self.read_record(&name) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping unreadable runtime record '{}': {}", name, e),
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    // ── exit status ────────────────────────────────────────────────────

    /// Exit code the launch wrapper wrote when the service's command returned.
    pub fn exit_code(&self, name: &str) -> Option<i32> {
        fs::read_to_string(self.exit_file_path(name))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    pub fn clear_exit_code(&self, name: &str) -> Result<()> {
        remove_if_exists(&self.exit_file_path(name))
    }

    // ── failure counters ───────────────────────────────────────────────

    pub fn failure_count(&self, name: &str) -> u32 {
        fs::read_to_string(self.failure_path(name))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Bump the counter and return the new value.
    pub fn increment_failures(&self, name: &str) -> Result<u32> {
        let next = self.failure_count(name).saturating_add(1);
        atomic_write(&self.failure_path(name), &next.to_string())?;
        Ok(next)
    }

    pub fn reset_failures(&self, name: &str) -> Result<()> {
        remove_if_exists(&self.failure_path(name))
    }

    /// Names with a counter file on disk.
    pub fn failure_entries(&self) -> Result<Vec<String>> {
        file_stems(&self.root.join(FAILURES_DIR), "count")
    }

    // ── monitor ────────────────────────────────────────────────────────

    pub fn read_monitor(&self) -> Result<Option<MonitorRecord>> {
        read_json(&self.root.join(MONITOR_FILE))
    }

    pub fn write_monitor(&self, record: &MonitorRecord) -> Result<()> {
        let contents = serde_json::to_string_pretty(record)?;
        atomic_write(&self.root.join(MONITOR_FILE), &contents)
    }

    pub fn remove_monitor(&self) -> Result<()> {
        remove_if_exists(&self.root.join(MONITOR_FILE))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Filesystem(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    Ok(Some(serde_json::from_str(&contents)?))
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Filesystem(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

fn file_stems(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut stems = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }
    }
    stems.sort();
    Ok(stems)
}

/// Write-then-rename so a crash mid-write never leaves a torn file.
fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| {
        Error::Filesystem(format!("Failed to create {}: {}", temp_path.display(), e))
    })?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        Error::Filesystem(format!("Failed to rename {}: {}", temp_path.display(), e))
    })
}
