use super::{RawSettings, ServiceDefinition, Settings};
use crate::dependency::Graph;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// On-disk layout of `services.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default, alias = "settings")]
    pub supervisor: RawSettings,

    #[serde(default)]
    pub services: BTreeMap<String, ServiceDefinition>,
}

/// The loaded service registry.
///
/// Iteration order is name order; `start_all` walks services in this order.
/// A registry is built once per command and not mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    services: BTreeMap<String, ServiceDefinition>,
    raw_settings: RawSettings,
    base_dir: PathBuf,
    path: Option<PathBuf>,
}

impl Registry {
    /// Empty registry whose relative paths resolve against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub(crate) fn from_file(file: RegistryFile, path: &Path) -> Self {
        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            services: file.services,
            raw_settings: file.supervisor,
            base_dir,
            path: Some(path.to_path_buf()),
        }
    }

    pub fn with_service(mut self, name: impl Into<String>, service: ServiceDefinition) -> Self {
        self.services.insert(name.into(), service);
        self
    }

    pub fn with_settings(mut self, raw: RawSettings) -> Self {
        self.raw_settings = raw;
        self
    }

    pub fn get(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ServiceDefinition)> {
        self.services.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Services `start_all` should bring up, in registry order.
    pub fn autostart_services(&self) -> Vec<String> {
        self.services
            .iter()
            .filter(|(_, svc)| svc.autostart)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Graph over registered services. Edges to unknown services are dropped;
    /// [`validate`](Self::validate) reports them.
    pub fn dependency_graph(&self) -> Graph {
        let mut graph = Graph::new();
        for (name, svc) in &self.services {
            graph.add_node(name.clone());
            for dep in &svc.dependencies {
                if self.services.contains_key(dep) {
                    graph.add_edge(name.clone(), dep.clone());
                }
            }
        }
        graph
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the file this registry was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn raw_settings(&self) -> &RawSettings {
        &self.raw_settings
    }

    /// Settings from the `supervisor:` block layered over defaults.
    pub fn settings(&self) -> Result<Settings> {
        Settings::resolve(&self.raw_settings, &self.base_dir)
    }
}
