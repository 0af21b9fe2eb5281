//! Registry parsing and types.
//!
//! - `service` - one registry entry (`ServiceDefinition`)
//! - `health` - health check and restart policy (`HealthCheck`, `RestartPolicy`)
//! - `registry` - the loaded registry (`Registry`)
//! - `settings` - the optional `supervisor:` block (`Settings`)
//! - `parser` - locating and reading `services.yaml`
//! - `validation` - registry checks behind `svctl validate`

mod duration;
mod health;
mod parser;
mod registry;
mod service;
mod settings;
mod validation;

pub use duration::*;
pub use health::*;
pub use parser::*;
pub use registry::*;
pub use service::*;
pub use settings::*;
