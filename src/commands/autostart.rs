use crate::output::UserOutput;
use std::path::Path;
use svc_supervisor::autostart::{install_autostart, AutostartContext, Platform};

pub fn run_setup_autostart(
    registry_path: &Path,
    platform: Option<&str>,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let platform = match platform {
        Some(p) => p.parse::<Platform>()?,
        None => Platform::current()?,
    };
    let ctx = AutostartContext::for_registry(registry_path)?;

    let report = install_autostart(platform, &ctx)?;
    match &report.path {
        Some(path) => out.success(&format!(
            "Installed {} autostart entry at {}",
            report.platform,
            path.display()
        )),
        None => out.success(&format!("Registered {} autostart task", report.platform)),
    }
    for warning in &report.warnings {
        out.warning(warning);
    }
    if !report.activated {
        out.warning("The entry was written but could not be activated; enable it manually.");
    }
    Ok(())
}
