mod checker;
mod http;

pub use checker::{check_with_fixed_delay, check_with_retry, HealthChecker};
pub use http::{validate_health_url, HttpChecker};
