use super::{ControlClient, ControlRequest, ControlResponse};
use crate::error::{Error, Result};
use crate::supervisor::{
    CleanReport, RestartAllReport, ServiceStatus, StartAllReport, StartOutcome, StopAllReport,
    StopOutcome, Supervisor, SupervisorActor, SupervisorHandle,
};
use std::path::{Path, PathBuf};

/// Where CLI commands are executed: a running monitor's actor, reached over
/// its socket, or an actor spawned in this process.
#[derive(Debug)]
pub enum Controller {
    Remote(ControlClient),
    Local(SupervisorHandle),
}

fn unexpected(response: ControlResponse) -> Error {
    Error::Control(format!("Unexpected response from monitor: {:?}", response))
}

impl Controller {
    /// Prefer the monitor at `socket`; otherwise build a local supervisor.
    pub async fn connect<F>(socket: &Path, local: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Supervisor>,
    {
        if let Some(mut client) = ControlClient::connect(socket).await? {
            match client.request(ControlRequest::Ping).await {
                Ok(ControlResponse::Pong { pid }) => {
                    tracing::debug!("Forwarding to monitor (PID {})", pid);
                    return Ok(Controller::Remote(client));
                }
                Ok(other) => return Err(unexpected(other)),
                Err(e) => tracing::debug!("Monitor did not answer ping: {}", e),
            }
        }
        let (handle, _task) = SupervisorActor::spawn(local()?)?;
        Ok(Controller::Local(handle))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Controller::Remote(_))
    }

    pub async fn start(&mut self, name: &str) -> Result<StartOutcome> {
        match self {
            Controller::Local(handle) => handle.start(name).await,
            Controller::Remote(client) => {
                let request = ControlRequest::Start {
                    name: name.to_string(),
                };
                match client.request(request).await? {
                    ControlResponse::Start(outcome) => Ok(outcome),
                    other => Err(unexpected(other)),
                }
            }
        }
    }

    pub async fn stop(&mut self, name: &str, force: bool) -> Result<StopOutcome> {
        match self {
            Controller::Local(handle) => handle.stop(name, force).await,
            Controller::Remote(client) => {
                let request = ControlRequest::Stop {
                    name: name.to_string(),
                    force,
                };
                match client.request(request).await? {
                    ControlResponse::Stop(outcome) => Ok(outcome),
                    other => Err(unexpected(other)),
                }
            }
        }
    }

    pub async fn restart(&mut self, name: &str) -> Result<StartOutcome> {
        match self {
            Controller::Local(handle) => handle.restart(name).await,
            Controller::Remote(client) => {
                let request = ControlRequest::Restart {
                    name: name.to_string(),
                };
                match client.request(request).await? {
                    ControlResponse::Start(outcome) => Ok(outcome),
                    other => Err(unexpected(other)),
                }
            }
        }
    }

    pub async fn start_all(&mut self) -> Result<StartAllReport> {
        match self {
            Controller::Local(handle) => handle.start_all().await,
            Controller::Remote(client) => match client.request(ControlRequest::StartAll).await? {
                ControlResponse::StartAll(report) => Ok(report),
                other => Err(unexpected(other)),
            },
        }
    }

    pub async fn stop_all(&mut self) -> Result<StopAllReport> {
        match self {
            Controller::Local(handle) => handle.stop_all().await,
            Controller::Remote(client) => match client.request(ControlRequest::StopAll).await? {
                ControlResponse::StopAll(report) => Ok(report),
                other => Err(unexpected(other)),
            },
        }
    }

    pub async fn restart_all(&mut self) -> Result<RestartAllReport> {
        match self {
            Controller::Local(handle) => handle.restart_all().await,
            Controller::Remote(client) => {
                match client.request(ControlRequest::RestartAll).await? {
                    ControlResponse::RestartAll(report) => Ok(report),
                    other => Err(unexpected(other)),
                }
            }
        }
    }

    pub async fn status(&mut self, name: Option<&str>) -> Result<Vec<ServiceStatus>> {
        match self {
            Controller::Local(handle) => handle.status(name).await,
            Controller::Remote(client) => {
                let request = ControlRequest::Status {
                    name: name.map(str::to_string),
                };
                match client.request(request).await? {
                    ControlResponse::Status(statuses) => Ok(statuses),
                    other => Err(unexpected(other)),
                }
            }
        }
    }

    pub async fn clean(&mut self) -> Result<CleanReport> {
        match self {
            Controller::Local(handle) => handle.clean().await,
            Controller::Remote(client) => match client.request(ControlRequest::Clean).await? {
                ControlResponse::Clean(report) => Ok(report),
                other => Err(unexpected(other)),
            },
        }
    }

    pub async fn backup(&mut self) -> Result<PathBuf> {
        match self {
            Controller::Local(handle) => handle.snapshot().await,
            Controller::Remote(client) => match client.request(ControlRequest::Backup).await? {
                ControlResponse::Backup { path } => Ok(path),
                other => Err(unexpected(other)),
            },
        }
    }
}
