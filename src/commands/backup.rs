use crate::output::UserOutput;
use svc_supervisor::control::Controller;

pub async fn run_backup(controller: &mut Controller, out: &dyn UserOutput) -> anyhow::Result<()> {
    let archive = controller.backup().await?;
    out.success(&format!("Snapshot written to {}", archive.display()));
    Ok(())
}
