use crate::output::UserOutput;
use std::path::PathBuf;
use svc_supervisor::Parser as RegistryParser;

pub fn run_validate(config_path: Option<PathBuf>, out: &dyn UserOutput) -> anyhow::Result<()> {
    let parser = RegistryParser::new();
    let config_path = match config_path {
        Some(path) => path,
        None => match parser.find_registry_file() {
            Ok(path) => path,
            Err(_) => {
                out.error("Error: No registry file found");
                out.error(&format!(
                    "\nSearched for services.yaml in {} and its parents",
                    std::env::current_dir()?.display()
                ));
                return Err(anyhow::anyhow!("Registry file not found"));
            }
        },
    };

    out.status(&format!("Validating {}...", config_path.display()));

    let registry = match parser.load_registry(&config_path) {
        Ok(registry) => registry,
        Err(e) => {
            out.error("Registry failed to load");
            return Err(e.into());
        }
    };

    let warnings = registry.validate()?;
    let settings = registry.settings()?;

    out.success("Registry is valid");
    out.blank();
    for warning in &warnings {
        out.warning(&format!("warning: {}", warning));
    }

    out.status(&format!("Services: {}", registry.len()));
    for (name, service) in registry.iter() {
        let mut notes = Vec::new();
        if !service.enabled {
            notes.push("disabled".to_string());
        }
        if !service.autostart {
            notes.push("manual".to_string());
        }
        if !service.dependencies.is_empty() {
            notes.push(format!("after {}", service.dependencies.join(", ")));
        }
        notes.push(format!("restart {}", service.restart_policy.mode));
        out.status(&format!("  - {} ({})", name, notes.join("; ")));
    }

    out.blank();
    out.status(&format!("Settings: {}", settings.describe()));
    Ok(())
}
