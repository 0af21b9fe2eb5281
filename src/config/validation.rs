use super::Registry;
use crate::error::{Error, Result};
use crate::healthcheck::validate_health_url;
use std::collections::HashMap;

impl Registry {
    /// Check the registry for definitions that can never work.
    ///
    /// Hard errors are returned as [`Error::Validation`]. Unknown
    /// dependencies and cycles are returned as warnings instead: `start_all`
    /// reports the affected services as failed at runtime.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut port_owners: HashMap<u16, &str> = HashMap::new();

        for (name, service) in self.iter() {
            if name.trim().is_empty() || name.contains('/') {
                errors.push(format!("Service name '{}' is not a valid file name", name));
            }

            if service.command.trim().is_empty() {
                errors.push(format!("Service '{}' has an empty command", name));
            }

            for port in &service.ports {
                if *port == 0 {
                    errors.push(format!("Service '{}' claims port 0", name));
                    continue;
                }
                if let Some(owner) = port_owners.insert(*port, name) {
                    if owner != name {
                        errors.push(format!(
                            "Port {} is claimed by both '{}' and '{}'",
                            port, owner, name
                        ));
                    }
                }
            }

            if let Some(hc) = &service.health_check {
                if let Err(e) = validate_health_url(&hc.url) {
                    errors.push(format!("Service '{}': {}", name, e));
                }
                if hc.retries == 0 {
                    errors.push(format!(
                        "Service '{}' health_check.retries must be at least 1",
                        name
                    ));
                }
            }

            for dep in &service.dependencies {
                if dep == name {
                    warnings.push(format!("Service '{}' depends on itself", name));
                } else if !self.contains(dep) {
                    warnings.push(format!(
                        "Service '{}' depends on '{}', which is not in the registry",
                        name, dep
                    ));
                }
            }
        }

        if let Err(Error::CircularDependency(path)) = self.dependency_graph().topological_sort() {
            warnings.push(format!(
                "Circular dependency: {} (these services will fail to start)",
                path.join(" -> ")
            ));
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(Error::Validation(errors.join("; ")))
        }
    }
}
