use super::SupervisorBuilder;
use crate::config::{Registry, ServiceDefinition, Settings};
use crate::error::{Error, Result};
use crate::healthcheck::HealthChecker;
use crate::port::PortReservation;
use crate::process::ProcessBackend;
use crate::state::{RuntimeRecord, StateStore};
use std::sync::Arc;

/// Lifecycle operations over one registry and one state directory.
///
/// A `Supervisor` holds no process state of its own: every decision reads the
/// runtime records on disk. Concurrent callers should go through
/// [`SupervisorActor`](super::SupervisorActor), which serializes them.
pub struct Supervisor {
    pub(super) registry: Arc<Registry>,
    pub(super) settings: Settings,
    pub(super) store: StateStore,
    pub(super) processes: Arc<dyn ProcessBackend>,
    pub(super) health: Arc<dyn HealthChecker>,
    pub(super) ports: Arc<dyn PortReservation>,
}

impl Supervisor {
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub(super) fn definition(&self, name: &str) -> Result<&ServiceDefinition> {
        self.registry
            .get(name)
            .ok_or_else(|| Error::ServiceNotFound(name.to_string()))
    }

    /// The runtime record, but only if its process is still the one recorded.
    pub fn live_record(&self, name: &str) -> Result<Option<RuntimeRecord>> {
        let Some(record) = self.store.read_record(name)? else {
            return Ok(None);
        };
        if !self.processes.is_alive(record.pid) {
            return Ok(None);
        }
        if !self.processes.matches_start_time(record.pid, record.started_at) {
            tracing::warn!(
                "Recorded PID {} for '{}' now belongs to another process",
                record.pid,
                name
            );
            return Ok(None);
        }
        Ok(Some(record))
    }

    pub fn running_pid(&self, name: &str) -> Result<Option<u32>> {
        Ok(self.live_record(name)?.map(|r| r.pid))
    }

    pub fn is_running(&self, name: &str) -> Result<bool> {
        Ok(self.live_record(name)?.is_some())
    }

    /// Drop a record whose process is gone, along with its exit status.
    pub(super) fn discard_record(&self, name: &str) -> Result<()> {
        self.store.remove_record(name)?;
        self.store.clear_exit_code(name)
    }
}
