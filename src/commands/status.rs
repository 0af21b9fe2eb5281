use crate::output::UserOutput;
use svc_supervisor::control::Controller;
use svc_supervisor::supervisor::{ServiceState, ServiceStatus};

pub async fn run_status(
    controller: &mut Controller,
    name: Option<&str>,
    json: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let statuses = controller.status(name).await?;

    if json {
        out.data(&serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    if statuses.is_empty() {
        out.status("No services registered");
        return Ok(());
    }

    let width = statuses.iter().map(|s| s.name.len()).max().unwrap_or(0).max(7);
    out.status(&format!(
        "{:<width$}  {:<8}  {:>7}  {:<9}  {:<10}  {}",
        "SERVICE",
        "STATE",
        "PID",
        "UPTIME",
        "HEALTH",
        "RESTART",
        width = width
    ));
    for status in &statuses {
        out.status(&format_row(status, width));
    }
    if controller.is_remote() {
        out.blank();
        out.status("(served by the running monitor)");
    }
    Ok(())
}

fn format_row(status: &ServiceStatus, width: usize) -> String {
    let pid = status
        .pid
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    let uptime = status
        .started_at
        .map(|at| format_uptime(chrono::Utc::now().signed_duration_since(at)))
        .unwrap_or_else(|| "-".to_string());
    let health = match (status.state, status.healthy) {
        (ServiceState::Running, Some(true)) => "healthy".to_string(),
        (ServiceState::Running, Some(false)) => format!("failing({})", status.failures),
        _ => "-".to_string(),
    };
    let mut name = status.name.clone();
    if !status.registered {
        name.push('*');
    }
    format!(
        "{:<width$}  {:<8}  {:>7}  {:<9}  {:<10}  {}",
        name,
        status.state,
        pid,
        uptime,
        health,
        status.restart,
        width = width
    )
}

fn format_uptime(elapsed: chrono::Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else if secs < 86_400 {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d{}h", secs / 86_400, (secs % 86_400) / 3600)
    }
}
