use super::{
    RestartAllReport, ServiceFailure, StartAllReport, StartOutcome, StopAllReport, StopOutcome,
    Supervisor,
};
use crate::error::Result;
use std::collections::{BTreeMap, HashSet};

impl Supervisor {
    /// Start every autostart service, retrying in passes until a pass makes no
    /// progress.
    ///
    /// A service waiting on dependencies stays pending for the next pass. What
    /// is still pending after the last productive pass is reported as failed,
    /// which covers both cycles and dependencies missing from the registry.
    pub async fn start_all(&self) -> Result<StartAllReport> {
        let mut report = StartAllReport::default();
        let mut pending: Vec<String> = self.registry.autostart_services();
        let mut waiting_on: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut pass = 0usize;

        while !pending.is_empty() {
            pass += 1;
            let mut progressed = false;
            let mut still_pending = Vec::new();

            for name in pending {
                match self.start(&name).await {
                    Ok(StartOutcome::Started { .. }) | Ok(StartOutcome::AlreadyRunning { .. }) => {
                        waiting_on.remove(&name);
                        report.started.push(name);
                        progressed = true;
                    }
                    Ok(StartOutcome::Disabled) => {
                        tracing::warn!("Skipping disabled service '{}'", name);
                        report.skipped.push(name);
                    }
                    Ok(StartOutcome::DependenciesUnready { missing }) => {
                        waiting_on.insert(name.clone(), missing);
                        still_pending.push(name);
                    }
                    Ok(StartOutcome::LaunchFailed { reason }) => {
                        report.failed.push(ServiceFailure::new(name, reason));
                    }
                    Err(e) => {
                        report.failed.push(ServiceFailure::new(name, e.to_string()));
                    }
                }
            }

            pending = still_pending;
            if !progressed {
                break;
            }
        }

        for name in pending {
            let reason = match waiting_on.remove(&name) {
                Some(missing) if !missing.is_empty() => {
                    format!("dependencies never became ready: {}", missing.join(", "))
                }
                _ => "dependencies never became ready".to_string(),
            };
            tracing::error!("Giving up on '{}': {}", name, reason);
            report.failed.push(ServiceFailure::new(name, reason));
        }

        tracing::info!(
            "start-all finished after {} pass(es): {} started, {} failed, {} skipped",
            pass,
            report.started.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Stop every running service, dependents before their dependencies.
    ///
    /// Processes recorded for services no longer in the registry go first,
    /// since nothing declared can depend on them.
    pub async fn stop_all(&self) -> Result<StopAllReport> {
        let mut report = StopAllReport::default();

        let mut order: Vec<String> = self
            .store
            .list_records()?
            .into_iter()
            .map(|r| r.name)
            .filter(|name| !self.registry.contains(name))
            .collect();
        let orphans: HashSet<String> = order.iter().cloned().collect();
        order.extend(
            self.registry
                .dependency_graph()
                .shutdown_order()
                .into_iter()
                .filter(|name| !orphans.contains(name)),
        );

        for name in order {
            match self.stop(&name, false).await {
                Ok(StopOutcome::Stopped { .. }) => report.stopped.push(name),
                Ok(StopOutcome::AlreadyStopped) => {}
                Err(e) => {
                    tracing::error!("Failed to stop '{}': {}", name, e);
                    report.failed.push(ServiceFailure::new(name, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    pub async fn restart_all(&self) -> Result<RestartAllReport> {
        let stop = self.stop_all().await?;
        let start = self.start_all().await?;
        Ok(RestartAllReport { stop, start })
    }
}
