use super::{ControlRequest, ControlResponse, MAX_LINE_LENGTH};
use crate::error::{Error, Result};
use futures::{SinkExt, StreamExt};
use std::io::ErrorKind;
use std::path::Path;
use tokio::net::UnixStream;
use tokio_util::codec::{Framed, LinesCodec};

/// One connection to a monitor's control socket.
#[derive(Debug)]
pub struct ControlClient {
    framed: Framed<UnixStream, LinesCodec>,
}

impl ControlClient {
    /// Connect to `path`. `Ok(None)` when no monitor is listening there.
    pub async fn connect(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        match UnixStream::connect(path).await {
            Ok(stream) => Ok(Some(Self {
                framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            })),
            Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound) => {
                tracing::debug!("Stale control socket at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(Error::Control(format!(
                "Failed to connect to {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Send one request and wait for its response.
    ///
    /// An error response from the monitor comes back as `Err`.
    #[tracing::instrument(skip(self))]
    pub async fn request(&mut self, request: ControlRequest) -> Result<ControlResponse> {
        let line = serde_json::to_string(&request)?;
        self.framed
            .send(line)
            .await
            .map_err(|e| Error::Control(e.to_string()))?;

        let reply = self
            .framed
            .next()
            .await
            .ok_or_else(|| Error::Control("Monitor closed the connection".to_string()))?
            .map_err(|e| Error::Control(e.to_string()))?;

        match serde_json::from_str::<ControlResponse>(&reply)? {
            ControlResponse::Error {
                not_found: Some(name),
                ..
            } => Err(Error::ServiceNotFound(name)),
            ControlResponse::Error { message, .. } => Err(Error::Control(message)),
            response => Ok(response),
        }
    }
}
