use crate::output::UserOutput;
use svc_supervisor::daemon::run_monitor;
use svc_supervisor::Supervisor;
use tokio_util::sync::CancellationToken;

pub async fn run_monitor_command(supervisor: Supervisor, out: &dyn UserOutput) -> anyhow::Result<()> {
    let interval = supervisor.settings().monitor_interval;
    let socket = supervisor.store().socket_path();

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    out.status(&format!(
        "Monitoring services every {:?} (control socket {}). Press Ctrl+C to stop.",
        interval,
        socket.display()
    ));
    run_monitor(supervisor, shutdown).await?;
    out.status("Monitor stopped. Services are still running.");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
