use crate::output::UserOutput;
use std::io::SeekFrom;
use std::path::Path;
use svc_supervisor::supervisor::read_log_tail;
use svc_supervisor::StateStore;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const MONITOR_LOG: &str = "monitor";

pub async fn run_logs(
    store: &StateStore,
    name: Option<&str>,
    lines: usize,
    follow: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let name = name.unwrap_or(MONITOR_LOG);
    let path = store.log_path(name);

    if !path.exists() && !follow {
        out.status(&format!("No logs available for '{}'", name));
        return Ok(());
    }

    for line in read_log_tail(&path, lines) {
        out.status(&line);
    }

    if follow {
        out.status(&format!("--- following {} (Ctrl+C to stop) ---", path.display()));
        follow_log(&path, out).await?;
    }
    Ok(())
}

async fn follow_log(path: &Path, out: &dyn UserOutput) -> anyhow::Result<()> {
    let mut offset = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
    let mut pending = String::new();

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        shutdown_tx.send(()).await.ok();
    });

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(std::time::Duration::from_millis(500)) => {
                let Ok(len) = tokio::fs::metadata(path).await.map(|m| m.len()) else {
                    continue;
                };
                if len < offset {
                    // truncated or replaced
                    offset = 0;
                    pending.clear();
                }
                if len == offset {
                    continue;
                }

                let mut file = tokio::fs::File::open(path).await?;
                file.seek(SeekFrom::Start(offset)).await?;
                let mut chunk = Vec::new();
                file.read_to_end(&mut chunk).await?;
                offset += chunk.len() as u64;

                pending.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = pending.find('\n') {
                    let line: String = pending.drain(..=pos).collect();
                    out.status(line.trim_end_matches('\n'));
                }
            }
        }
    }
    Ok(())
}
