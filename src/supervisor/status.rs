use super::{CleanReport, ProbeResult, ServiceState, ServiceStatus, Supervisor};
use crate::config::RestartMode;
use crate::error::{Error, Result};
use std::collections::BTreeSet;

impl Supervisor {
    /// Status of one service, or of every registered and recorded service.
    pub async fn status(&self, name: Option<&str>) -> Result<Vec<ServiceStatus>> {
        let names: Vec<String> = match name {
            Some(name) => {
                if !self.registry.contains(name) && self.store.read_record(name)?.is_none() {
                    return Err(Error::ServiceNotFound(name.to_string()));
                }
                vec![name.to_string()]
            }
            None => {
                let mut all: BTreeSet<String> = self.registry.names().into_iter().collect();
                all.extend(self.store.list_records()?.into_iter().map(|r| r.name));
                all.into_iter().collect()
            }
        };

        let mut statuses = Vec::with_capacity(names.len());
        for name in names {
            statuses.push(self.service_status(&name).await?);
        }
        Ok(statuses)
    }

    async fn service_status(&self, name: &str) -> Result<ServiceStatus> {
        let def = self.registry.get(name);
        let live = self.live_record(name)?;

        let state = match (&live, def) {
            (Some(_), _) => ServiceState::Running,
            (None, Some(def)) if !def.enabled => ServiceState::Disabled,
            (None, _) if self.store.read_record(name)?.is_some() => ServiceState::Crashed,
            (None, _) => ServiceState::Stopped,
        };

        let healthy = match (&live, def.and_then(|d| d.health_check.as_ref())) {
            (Some(_), Some(_)) => Some(self.probe(name).await? == ProbeResult::Healthy),
            _ => None,
        };

        Ok(ServiceStatus {
            name: name.to_string(),
            state,
            pid: live.as_ref().map(|r| r.pid),
            started_at: live.as_ref().map(|r| r.started_at),
            failures: self.store.failure_count(name),
            healthy,
            restart: def
                .map(|d| d.restart_policy.mode)
                .unwrap_or(RestartMode::Never),
            registered: def.is_some(),
        })
    }

    /// Remove state left behind by processes that are gone.
    pub fn clean(&self) -> Result<CleanReport> {
        let mut report = CleanReport::default();

        for record in self.store.list_records()? {
            if self.live_record(&record.name)?.is_none() {
                tracing::info!("Removing stale record for '{}' (PID {})", record.name, record.pid);
                self.discard_record(&record.name)?;
                report.records_removed.push(record.name);
            }
        }

        for name in self.store.failure_entries()? {
            if !self.registry.contains(&name) || !self.is_running(&name)? {
                self.store.reset_failures(&name)?;
                report.counters_removed.push(name);
            }
        }

        if let Some(monitor) = self.store.read_monitor()? {
            if !self.processes.is_alive(monitor.pid) {
                tracing::info!("Removing stale monitor record (PID {})", monitor.pid);
                self.store.remove_monitor()?;
                if monitor.socket.exists() {
                    std::fs::remove_file(&monitor.socket)?;
                }
                report.monitor_removed = true;
            }
        }

        Ok(report)
    }
}
