use crate::config::HealthCheck;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;

/// Probes a service's liveness endpoint.
///
/// One call is one bounded probe; retrying is the caller's business.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// `Ok(false)` for an unhealthy answer; `Err` only for a bad target.
    async fn check(&self, target: &HealthCheck) -> Result<bool>;
}

/// Probe up to `target.retries` times with a fixed `target.interval()` pause
/// between attempts. Used once, right after launch.
pub async fn check_with_retry<C: HealthChecker + ?Sized>(checker: &C, target: &HealthCheck) -> bool {
    check_with_fixed_delay(checker, target, target.retries, target.interval()).await
}

pub async fn check_with_fixed_delay<C: HealthChecker + ?Sized>(
    checker: &C,
    target: &HealthCheck,
    attempts: u32,
    delay: Duration,
) -> bool {
    for attempt in 0..attempts {
        match checker.check(target).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                tracing::debug!("Health probe for {} errored: {}", target.url, e);
            }
        }
        if attempt + 1 < attempts {
            sleep(delay).await;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Healthy from the n-th call on.
    struct HealthyAfter {
        calls: AtomicU32,
        healthy_from: u32,
    }

    #[async_trait]
    impl HealthChecker for HealthyAfter {
        async fn check(&self, _target: &HealthCheck) -> Result<bool> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(n >= self.healthy_from)
        }
    }

    #[tokio::test]
    async fn retries_until_healthy() {
        let checker = HealthyAfter {
            calls: AtomicU32::new(0),
            healthy_from: 3,
        };
        let target = HealthCheck::new("http://localhost/health");
        assert!(check_with_fixed_delay(&checker, &target, 5, Duration::from_millis(1)).await);
        assert_eq!(checker.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_attempts() {
        let checker = HealthyAfter {
            calls: AtomicU32::new(0),
            healthy_from: 10,
        };
        let target = HealthCheck::new("http://localhost/health");
        assert!(!check_with_fixed_delay(&checker, &target, 2, Duration::from_millis(1)).await);
        assert_eq!(checker.calls.load(Ordering::SeqCst), 2);
    }
}
