use super::Supervisor;
use crate::config::{Registry, Settings};
use crate::error::{Error, Result};
use crate::healthcheck::{HealthChecker, HttpChecker};
use crate::port::{PortReservation, SystemPorts};
use crate::process::{ProcessBackend, UnixProcessBackend};
use crate::state::StateStore;
use std::sync::Arc;

/// Builder for a [`Supervisor`].
///
/// Only the registry is required. Settings default to the registry's
/// `supervisor:` block; backends default to the real OS implementations.
///
/// ```no_run
/// use svc_supervisor::{Registry, Supervisor};
///
/// # fn example(registry: Registry) -> Result<(), svc_supervisor::Error> {
/// let supervisor = Supervisor::builder().registry(registry).build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SupervisorBuilder {
    registry: Option<Registry>,
    settings: Option<Settings>,
    processes: Option<Arc<dyn ProcessBackend>>,
    health: Option<Arc<dyn HealthChecker>>,
    ports: Option<Arc<dyn PortReservation>>,
}

impl SupervisorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Override the resolved settings (CLI flags and environment already applied).
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn process_backend(mut self, backend: Arc<dyn ProcessBackend>) -> Self {
        self.processes = Some(backend);
        self
    }

    pub fn health_checker(mut self, checker: Arc<dyn HealthChecker>) -> Self {
        self.health = Some(checker);
        self
    }

    pub fn port_reservation(mut self, ports: Arc<dyn PortReservation>) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Open the state directory and assemble the supervisor.
    pub fn build(self) -> Result<Supervisor> {
        let registry = self
            .registry
            .ok_or_else(|| Error::Config("Supervisor requires a registry".to_string()))?;
        let settings = match self.settings {
            Some(settings) => settings,
            None => registry.settings()?,
        };
        let store = StateStore::open(&settings.state_dir)?;

        let ports = self
            .ports
            .unwrap_or_else(|| Arc::new(SystemPorts::new(settings.port_clear_wait)));

        Ok(Supervisor {
            registry: Arc::new(registry),
            store,
            processes: self
                .processes
                .unwrap_or_else(|| Arc::new(UnixProcessBackend::new())),
            health: self.health.unwrap_or_else(|| Arc::new(HttpChecker::new())),
            ports,
            settings,
        })
    }
}
