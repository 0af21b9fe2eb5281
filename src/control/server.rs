use super::{ControlRequest, ControlResponse, MAX_LINE_LENGTH};
use crate::error::{Error, Result};
use crate::supervisor::SupervisorHandle;
use futures::{SinkExt, StreamExt};
use std::path::{Path, PathBuf};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;

/// Run one request against the actor.
pub async fn dispatch(handle: &SupervisorHandle, request: ControlRequest) -> ControlResponse {
    let result = match request {
        ControlRequest::Ping => Ok(ControlResponse::Pong {
            pid: std::process::id(),
        }),
        ControlRequest::Start { name } => handle.start(&name).await.map(ControlResponse::Start),
        ControlRequest::Stop { name, force } => {
            handle.stop(&name, force).await.map(ControlResponse::Stop)
        }
        ControlRequest::Restart { name } => {
            handle.restart(&name).await.map(ControlResponse::Start)
        }
        ControlRequest::StartAll => handle.start_all().await.map(ControlResponse::StartAll),
        ControlRequest::StopAll => handle.stop_all().await.map(ControlResponse::StopAll),
        ControlRequest::RestartAll => handle.restart_all().await.map(ControlResponse::RestartAll),
        ControlRequest::Status { name } => handle
            .status(name.as_deref())
            .await
            .map(ControlResponse::Status),
        ControlRequest::Clean => handle.clean().await.map(ControlResponse::Clean),
        ControlRequest::Backup => handle
            .snapshot()
            .await
            .map(|path| ControlResponse::Backup { path }),
    };
    result.unwrap_or_else(|e| ControlResponse::from_error(&e))
}

/// Listens on the monitor's Unix socket and forwards requests to the actor.
#[derive(Debug)]
pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
    handle: SupervisorHandle,
}

impl ControlServer {
    /// Bind `path`, replacing a socket file left by a dead monitor.
    pub fn bind(path: &Path, handle: SupervisorHandle) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path).map_err(|e| {
            Error::Control(format!("Failed to bind {}: {}", path.display(), e))
        })?;
        tracing::debug!("Control socket listening on {}", path.display());
        Ok(Self {
            listener,
            path: path.to_path_buf(),
            handle,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until `cancel` fires, then remove the socket file.
    pub async fn serve(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let handle = self.handle.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, handle).await {
                                tracing::debug!("Control connection ended: {}", e);
                            }
                        });
                    }
                    Err(e) => tracing::warn!("Control socket accept failed: {}", e),
                },
            }
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

async fn serve_connection(stream: UnixStream, handle: SupervisorHandle) -> Result<()> {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    while let Some(line) = framed.next().await {
        let line = line.map_err(|e| Error::Control(e.to_string()))?;
        let response = match serde_json::from_str::<ControlRequest>(&line) {
            Ok(request) => {
                tracing::debug!("Control request: {:?}", request);
                dispatch(&handle, request).await
            }
            Err(e) => ControlResponse::Error {
                message: format!("Malformed request: {}", e),
                not_found: None,
            },
        };
        let encoded = serde_json::to_string(&response)?;
        framed
            .send(encoded)
            .await
            .map_err(|e| Error::Control(e.to_string()))?;
    }
    Ok(())
}
