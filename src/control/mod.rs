//! Control socket: lets CLI invocations reach a running monitor's actor.
//!
//! The wire format is newline-delimited JSON, one [`ControlRequest`] line
//! answered by one [`ControlResponse`] line.

mod client;
mod controller;
mod server;

pub use client::ControlClient;
pub use controller::Controller;
pub use server::{dispatch, ControlServer};

use crate::error::Error;
use crate::supervisor::{
    CleanReport, RestartAllReport, ServiceStatus, StartAllReport, StartOutcome, StopAllReport,
    StopOutcome,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Longest accepted line on the socket.
pub const MAX_LINE_LENGTH: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum ControlRequest {
    Ping,
    Start {
        name: String,
    },
    Stop {
        name: String,
        #[serde(default)]
        force: bool,
    },
    Restart {
        name: String,
    },
    StartAll,
    StopAll,
    RestartAll,
    Status {
        #[serde(default)]
        name: Option<String>,
    },
    Clean,
    Backup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", content = "body", rename_all = "kebab-case")]
pub enum ControlResponse {
    Pong { pid: u32 },
    Start(StartOutcome),
    Stop(StopOutcome),
    StartAll(StartAllReport),
    StopAll(StopAllReport),
    RestartAll(RestartAllReport),
    Status(Vec<ServiceStatus>),
    Clean(CleanReport),
    Backup { path: PathBuf },
    Error {
        message: String,
        /// Set when the error was an unknown service, so the client can
        /// rebuild [`Error::ServiceNotFound`].
        #[serde(default)]
        not_found: Option<String>,
    },
}

impl ControlResponse {
    pub fn from_error(error: &Error) -> Self {
        let not_found = match error {
            Error::ServiceNotFound(name) => Some(name.clone()),
            _ => None,
        };
        ControlResponse::Error {
            message: error.to_string(),
            not_found,
        }
    }
}
