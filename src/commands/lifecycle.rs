use crate::output::UserOutput;
use svc_supervisor::control::Controller;
use svc_supervisor::supervisor::{RestartAllReport, StartAllReport, StopAllReport};
use svc_supervisor::StartOutcome;

/// Print a single-service start result; refusals other than `Disabled` fail the command.
fn report_start(name: &str, outcome: &StartOutcome, out: &dyn UserOutput) -> anyhow::Result<()> {
    match outcome {
        StartOutcome::Started { healthy: Some(false), .. } => {
            out.warning(&format!("{}: {}", name, outcome));
            Ok(())
        }
        StartOutcome::Started { .. } => {
            out.success(&format!("{}: {}", name, outcome));
            Ok(())
        }
        StartOutcome::AlreadyRunning { .. } => {
            out.status(&format!("{}: {}", name, outcome));
            Ok(())
        }
        StartOutcome::Disabled => {
            out.warning(&format!("{}: disabled in the registry, not started", name));
            Ok(())
        }
        StartOutcome::DependenciesUnready { .. } | StartOutcome::LaunchFailed { .. } => {
            out.error(&format!("{}: {}", name, outcome));
            anyhow::bail!("Failed to start '{}'", name)
        }
    }
}

pub async fn run_start(
    controller: &mut Controller,
    name: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let outcome = controller.start(name).await?;
    report_start(name, &outcome, out)
}

pub async fn run_stop(
    controller: &mut Controller,
    name: &str,
    force: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let outcome = controller.stop(name, force).await?;
    out.success(&format!("{}: {}", name, outcome));
    Ok(())
}

pub async fn run_restart(
    controller: &mut Controller,
    name: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    out.status(&format!("Restarting {}...", name));
    let outcome = controller.restart(name).await?;
    report_start(name, &outcome, out)
}

fn print_start_all(report: &StartAllReport, out: &dyn UserOutput) {
    for name in &report.started {
        out.success(&format!("  started  {}", name));
    }
    for name in &report.skipped {
        out.warning(&format!("  skipped  {} (disabled)", name));
    }
    for failure in &report.failed {
        out.error(&format!("  failed   {}: {}", failure.name, failure.reason));
    }
}

fn print_stop_all(report: &StopAllReport, out: &dyn UserOutput) {
    if report.stopped.is_empty() && report.failed.is_empty() {
        out.status("Nothing was running");
    }
    for name in &report.stopped {
        out.success(&format!("  stopped  {}", name));
    }
    for failure in &report.failed {
        out.error(&format!("  failed   {}: {}", failure.name, failure.reason));
    }
}

pub async fn run_start_all(controller: &mut Controller, out: &dyn UserOutput) -> anyhow::Result<()> {
    out.status("Starting services...");
    let report = controller.start_all().await?;
    print_start_all(&report, out);
    if !report.is_success() {
        anyhow::bail!(
            "{} service(s) failed to start: {}",
            report.failed.len(),
            report.failed_names().join(", ")
        );
    }
    Ok(())
}

pub async fn run_stop_all(controller: &mut Controller, out: &dyn UserOutput) -> anyhow::Result<()> {
    out.status("Stopping all services...");
    let report = controller.stop_all().await?;
    print_stop_all(&report, out);
    if !report.failed.is_empty() {
        anyhow::bail!("{} service(s) failed to stop", report.failed.len());
    }
    Ok(())
}

pub async fn run_restart_all(
    controller: &mut Controller,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    out.status("Restarting all services...");
    let RestartAllReport { stop, start } = controller.restart_all().await?;
    print_stop_all(&stop, out);
    print_start_all(&start, out);
    if !stop.failed.is_empty() || !start.is_success() {
        anyhow::bail!("restart-all finished with failures");
    }
    Ok(())
}
