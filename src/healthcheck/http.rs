use super::HealthChecker;
use crate::config::HealthCheck;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;

/// Shared client for every probe, so many services do not each hold a pool.
/// Per-request timeouts override the client-wide fallback.
static SHARED_HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn shared_client() -> Result<&'static Client> {
    if let Some(client) = SHARED_HTTP_CLIENT.get() {
        return Ok(client);
    }
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
    Ok(SHARED_HTTP_CLIENT.get_or_init(|| client))
}

/// Validate that a URL is well-formed and uses HTTP/HTTPS scheme.
pub fn validate_health_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url)
        .map_err(|e| Error::Config(format!("Invalid health check URL '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "Invalid health check URL '{}': scheme must be http or https, got '{}'",
            url, other
        ))),
    }
}

/// HTTP GET prober: any 2xx within the timeout is healthy.
#[derive(Debug, Default, Clone)]
pub struct HttpChecker;

impl HttpChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HealthChecker for HttpChecker {
    async fn check(&self, target: &HealthCheck) -> Result<bool> {
        validate_health_url(&target.url)?;
        let client = shared_client()?;

        match client
            .get(&target.url)
            .timeout(target.timeout())
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::debug!("Health probe {} failed: {}", target.url, e);
                Ok(false)
            }
        }
    }
}
