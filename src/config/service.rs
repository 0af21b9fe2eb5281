use super::{HealthCheck, RestartPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One entry of the service registry.
///
/// ```yaml
/// services:
///   api:
///     command: "node server.js"
///     workingDir: ./api
///     environment:
///       PORT: "8080"
///     ports: [8080]
///     dependencies: [db]
///     health_check:
///       url: "http://127.0.0.1:8080/health"
///     restart_policy:
///       mode: on-failure
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub command: String,

    #[serde(default, alias = "workingDir", alias = "cwd")]
    pub working_dir: Option<PathBuf>,

    #[serde(default, alias = "env")]
    pub environment: HashMap<String, String>,

    #[serde(default)]
    pub ports: Vec<u16>,

    #[serde(default, alias = "depends_on", alias = "dependsOn")]
    pub dependencies: Vec<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub autostart: bool,

    #[serde(
        default,
        alias = "healthCheck",
        alias = "healthcheck",
        skip_serializing_if = "Option::is_none"
    )]
    pub health_check: Option<HealthCheck>,

    #[serde(default, alias = "restartPolicy", alias = "restart")]
    pub restart_policy: RestartPolicy,
}

fn default_true() -> bool {
    true
}

impl ServiceDefinition {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            environment: HashMap::new(),
            ports: Vec::new(),
            dependencies: Vec::new(),
            enabled: true,
            autostart: true,
            health_check: None,
            restart_policy: RestartPolicy::default(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports = ports.into_iter().collect();
        self
    }

    pub fn with_health_check(mut self, check: HealthCheck) -> Self {
        self.health_check = Some(check);
        self
    }

    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn manual(mut self) -> Self {
        self.autostart = false;
        self
    }

    /// Working directory for the spawned process. Relative paths are taken
    /// from the registry file's directory.
    pub fn resolve_working_dir(&self, base_dir: &Path) -> PathBuf {
        match &self.working_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => base_dir.join(dir),
            None => base_dir.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let svc: ServiceDefinition = serde_yaml::from_str("command: sleep 60").unwrap();
        assert!(svc.enabled);
        assert!(svc.autostart);
        assert!(svc.dependencies.is_empty());
        assert!(svc.health_check.is_none());
    }

    #[test]
    fn test_aliases() {
        let yaml = r#"
command: ./run.sh
workingDir: app
dependsOn: [db]
env:
  MODE: dev
"#;
        let svc: ServiceDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(svc.dependencies, vec!["db".to_string()]);
        assert_eq!(svc.environment.get("MODE").map(String::as_str), Some("dev"));
        assert_eq!(
            svc.resolve_working_dir(Path::new("/srv")),
            PathBuf::from("/srv/app")
        );
    }

    #[test]
    fn test_absolute_working_dir_is_kept() {
        let mut svc = ServiceDefinition::new("true");
        svc.working_dir = Some(PathBuf::from("/opt/app"));
        assert_eq!(
            svc.resolve_working_dir(Path::new("/srv")),
            PathBuf::from("/opt/app")
        );
    }
}
