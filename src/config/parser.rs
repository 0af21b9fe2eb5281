use super::{Registry, RegistryFile};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

const REGISTRY_FILE_NAMES: [&str; 2] = ["services.yaml", "services.yml"];

pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// Find the registry starting from the current directory
    pub fn find_registry_file(&self) -> Result<PathBuf> {
        let current_dir = std::env::current_dir()?;
        Self::find_registry_in_dir(&current_dir)
    }

    pub fn find_registry_in_dir(dir: &Path) -> Result<PathBuf> {
        for ancestor in dir.ancestors() {
            for name in REGISTRY_FILE_NAMES {
                let candidate = ancestor.join(name);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }

        Err(Error::Config(format!(
            "Could not find services.yaml in {} or any parent",
            dir.display()
        )))
    }

    /// Load the registry from a file path
    pub fn load_registry<P: AsRef<Path>>(&self, path: P) -> Result<Registry> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read registry file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let file = self.parse_registry(&content)?;
        Ok(Registry::from_file(file, path))
    }

    /// Parse registry YAML without touching the filesystem
    pub fn parse_registry(&self, content: &str) -> Result<RegistryFile> {
        if content.trim().is_empty() {
            return Ok(RegistryFile::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| Error::Parse(format!("Failed to parse services.yaml: {}", e)))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestartMode;

    #[test]
    fn test_parse_registry() {
        let yaml = r#"
supervisor:
  grace_period: 5s

services:
  api:
    command: node server.js
    ports: [8080]
    dependencies: [db]
    health_check:
      url: http://127.0.0.1:8080/health
    restart_policy:
      mode: always
  db:
    command: postgres -D data
    autostart: false
"#;
        let file = Parser::new().parse_registry(yaml).unwrap();
        assert_eq!(file.services.len(), 2);
        assert_eq!(file.supervisor.grace_period.as_deref(), Some("5s"));

        let api = &file.services["api"];
        assert_eq!(api.ports, vec![8080]);
        assert_eq!(api.restart_policy.mode, RestartMode::Always);
        assert!(!file.services["db"].autostart);
    }

    #[test]
    fn test_parse_rejects_unknown_shape() {
        let err = Parser::new().parse_registry("services: [1, 2]").unwrap_err();
        assert!(matches!(err, Error::Parse(ref msg) if msg.contains("services.yaml")));
    }

    #[test]
    fn test_empty_file_is_empty_registry() {
        let file = Parser::new().parse_registry("   \n").unwrap();
        assert!(file.services.is_empty());
    }

    #[test]
    fn test_find_registry_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("services.yml"), "services: {}\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = Parser::find_registry_in_dir(&nested).unwrap();
        assert_eq!(found, dir.path().join("services.yml"));
    }

    #[test]
    fn test_load_registry_sets_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("services.yaml");
        std::fs::write(&path, "services:\n  web:\n    command: sleep 60\n").unwrap();

        let registry = Parser::new().load_registry(&path).unwrap();
        assert_eq!(registry.base_dir(), dir.path());
        assert!(registry.contains("web"));
    }
}
