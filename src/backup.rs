//! Timestamped state snapshots: `snapshot-YYYYmmdd-HHMMSS.tar.gz` under the
//! backup directory, pruned by age.

use crate::error::{Error, Result};
use crate::supervisor::{read_log_tail, Supervisor};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

const SNAPSHOT_PREFIX: &str = "snapshot-";
const ARCHIVE_SUFFIX: &str = ".tar.gz";
const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

impl Supervisor {
    /// Archive the registry, runtime records and recent logs, then prune old
    /// archives. Returns the new archive's path.
    pub async fn snapshot(&self) -> Result<PathBuf> {
        let settings = self.settings();
        let now = Utc::now();

        let staging = stage_snapshot(self, &settings.backup_dir, now)?;
        let archive = pack(&staging).await;
        if let Err(e) = std::fs::remove_dir_all(&staging) {
            tracing::debug!("Failed to remove staging dir {}: {}", staging.display(), e);
        }
        let archive = archive?;

        let pruned = prune_snapshots(&settings.backup_dir, settings.backup_retention(), now)?;
        if !pruned.is_empty() {
            tracing::info!("Pruned {} old snapshot(s)", pruned.len());
        }
        Ok(archive)
    }
}

fn snapshot_name(at: DateTime<Utc>) -> String {
    format!("{}{}", SNAPSHOT_PREFIX, at.format(STAMP_FORMAT))
}

/// When an archive was taken, from its file name.
pub fn snapshot_time(file_name: &str) -> Option<DateTime<Utc>> {
    let stamp = file_name
        .strip_prefix(SNAPSHOT_PREFIX)?
        .strip_suffix(ARCHIVE_SUFFIX)?;
    NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn stage_snapshot(supervisor: &Supervisor, backup_dir: &Path, now: DateTime<Utc>) -> Result<PathBuf> {
    let staging = backup_dir.join(snapshot_name(now));
    std::fs::create_dir_all(&staging).map_err(|e| {
        Error::Filesystem(format!(
            "Failed to create snapshot dir {}: {}",
            staging.display(),
            e
        ))
    })?;

    if let Some(registry) = supervisor.registry().path() {
        if let Some(file_name) = registry.file_name() {
            std::fs::copy(registry, staging.join(file_name))?;
        }
    }

    let store = supervisor.store();
    let run_dir = staging.join("run");
    std::fs::create_dir_all(&run_dir)?;
    for record in store.list_records()? {
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(run_dir.join(format!("{}.json", record.name)), json)?;
    }

    let logs_dir = staging.join("logs");
    std::fs::create_dir_all(&logs_dir)?;
    let tail = supervisor.settings().log_tail_lines;
    if let Ok(entries) = std::fs::read_dir(store.logs_dir()) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("log") {
                continue;
            }
            let lines = read_log_tail(&path, tail);
            let mut content = lines.join("\n");
            if !content.is_empty() {
                content.push('\n');
            }
            std::fs::write(logs_dir.join(entry.file_name()), content)?;
        }
    }

    Ok(staging)
}

async fn pack(staging: &Path) -> Result<PathBuf> {
    let (Some(parent), Some(dir_name)) = (staging.parent(), staging.file_name()) else {
        return Err(Error::Backup(format!(
            "Invalid snapshot dir {}",
            staging.display()
        )));
    };
    let archive = parent.join(format!("{}{}", dir_name.to_string_lossy(), ARCHIVE_SUFFIX));

    let output = Command::new("tar")
        .arg("-czf")
        .arg(&archive)
        .arg("-C")
        .arg(parent)
        .arg(dir_name)
        .output()
        .await
        .map_err(|e| Error::Backup(format!("Failed to run tar: {}", e)))?;
    if !output.status.success() {
        return Err(Error::Backup(format!(
            "tar exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(archive)
}

/// Delete archives in `dir` older than `retention` at `now`.
///
/// Only files named like a snapshot archive are considered.
pub fn prune_snapshots(dir: &Path, retention: Duration, now: DateTime<Utc>) -> Result<Vec<PathBuf>> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Ok(Vec::new());
    };
    let retention = chrono::Duration::from_std(retention)
        .map_err(|e| Error::Backup(format!("Invalid retention window: {}", e)))?;
    let cutoff = now - retention;

    let mut removed = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(taken) = snapshot_time(&name.to_string_lossy()) else {
            continue;
        };
        if taken < cutoff {
            let path = entry.path();
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed expired snapshot {}", path.display());
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn parses_snapshot_names() {
        let t = snapshot_time("snapshot-20240102-030405.tar.gz").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        assert!(snapshot_time("snapshot-garbage.tar.gz").is_none());
        assert!(snapshot_time("notes.txt").is_none());
    }

    #[test]
    fn name_and_time_agree() {
        let at = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 58).unwrap();
        let file = format!("{}{}", snapshot_name(at), ARCHIVE_SUFFIX);
        assert_eq!(snapshot_time(&file), Some(at));
    }

    #[test]
    fn prunes_only_expired_archives() {
        let dir = TempDir::new().unwrap();
        for name in [
            "snapshot-20240101-000000.tar.gz",
            "snapshot-20240109-000000.tar.gz",
            "snapshot-20240110-120000.tar.gz",
            "unrelated.tar.gz",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let removed =
            prune_snapshots(dir.path(), Duration::from_secs(7 * 24 * 3600), now).unwrap();

        assert_eq!(removed, vec![dir.path().join("snapshot-20240101-000000.tar.gz")]);
        assert!(dir.path().join("snapshot-20240109-000000.tar.gz").exists());
        assert!(dir.path().join("unrelated.tar.gz").exists());
    }

    #[test]
    fn pruning_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let removed =
            prune_snapshots(&dir.path().join("none"), Duration::from_secs(1), Utc::now()).unwrap();
        assert!(removed.is_empty());
    }
}
