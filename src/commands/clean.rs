use crate::output::UserOutput;
use svc_supervisor::control::Controller;

pub async fn run_clean(controller: &mut Controller, out: &dyn UserOutput) -> anyhow::Result<()> {
    let report = controller.clean().await?;

    if report.is_empty() {
        out.status("Nothing to clean");
        return Ok(());
    }
    for name in &report.records_removed {
        out.status(&format!("  removed stale record for {}", name));
    }
    for name in &report.counters_removed {
        out.status(&format!("  removed failure counter for {}", name));
    }
    if report.monitor_removed {
        out.status("  removed stale monitor record");
    }
    out.success("State directory cleaned");
    Ok(())
}
