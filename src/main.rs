mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use output::{CliOutput, UserOutput};
use std::path::Path;
use svc_supervisor::control::Controller;
use svc_supervisor::{
    Error as SupervisorError, Parser as RegistryParser, Settings, StateStore, Supervisor,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(err) = e.downcast_ref::<SupervisorError>() {
            eprintln!("Error: {}", err);
            if let Some(suggestion) = err.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let out = CliOutput;

    // ── Tier 1: commands that load the registry themselves ────────────
    if let Commands::Validate = &cli.command {
        init_tracing(None)?;
        return commands::run_validate(cli.config.clone(), &out);
    }

    // ── Load registry and settings ───────────────────────────────────
    let parser = RegistryParser::new();
    let registry_path = match cli.config.clone() {
        Some(path) => path,
        None => parser.find_registry_file()?,
    };
    let registry = parser.load_registry(&registry_path)?;
    let settings = resolve_settings(&registry.settings()?, cli.state_dir.as_deref())?;

    let store = StateStore::new(&settings.state_dir);
    let monitor_log = match &cli.command {
        Commands::Monitor { log_file: true } => {
            std::fs::create_dir_all(store.logs_dir())?;
            Some(store.log_path("monitor"))
        }
        _ => None,
    };
    init_tracing(monitor_log.as_deref())?;

    match registry.validate() {
        Ok(warnings) => {
            for warning in warnings {
                tracing::warn!("{}", warning);
            }
        }
        Err(e) if cli.command.tolerates_invalid_registry() => {
            tracing::warn!("{}; continuing with existing state", e);
        }
        Err(e) => return Err(e.into()),
    }

    // ── Tier 2: commands that need the registry but no supervisor ────
    match &cli.command {
        Commands::SetupAutostart { platform } => {
            return commands::run_setup_autostart(&registry_path, platform.as_deref(), &out);
        }
        Commands::Logs {
            name,
            lines,
            follow,
        } => {
            let lines = lines.unwrap_or(settings.log_tail_lines);
            return commands::run_logs(&store, name.as_deref(), lines, *follow, &out).await;
        }
        _ => {}
    }

    let build_supervisor = || {
        Supervisor::builder()
            .registry(registry)
            .settings(settings.clone())
            .build()
    };

    // ── Tier 3: the monitor owns its supervisor ──────────────────────
    if let Commands::Monitor { .. } = &cli.command {
        return commands::run_monitor_command(build_supervisor()?, &out).await;
    }

    // ── Tier 4: everything else goes through a controller ────────────
    let mut controller = Controller::connect(&store.socket_path(), build_supervisor).await?;

    match cli.command {
        Commands::Start { name } => commands::run_start(&mut controller, &name, &out).await,
        Commands::Stop { name, force } => {
            commands::run_stop(&mut controller, &name, force, &out).await
        }
        Commands::Restart { name } => commands::run_restart(&mut controller, &name, &out).await,
        Commands::StartAll => commands::run_start_all(&mut controller, &out).await,
        Commands::StopAll => commands::run_stop_all(&mut controller, &out).await,
        Commands::RestartAll => commands::run_restart_all(&mut controller, &out).await,
        Commands::Status { name, json } => {
            commands::run_status(&mut controller, name.as_deref(), json, &out).await
        }
        Commands::Clean => commands::run_clean(&mut controller, &out).await,
        Commands::Backup => commands::run_backup(&mut controller, &out).await,
        Commands::Validate
        | Commands::SetupAutostart { .. }
        | Commands::Logs { .. }
        | Commands::Monitor { .. } => {
            out.error("command already handled");
            Ok(())
        }
    }
}

/// File block, then `SVCTL_*` environment, then `--state-dir`.
fn resolve_settings(
    file_settings: &Settings,
    state_dir: Option<&Path>,
) -> anyhow::Result<Settings> {
    let mut settings = file_settings.clone();
    settings.apply_env()?;
    if let Some(dir) = state_dir {
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            std::env::current_dir()?.join(dir)
        };
        settings.set_state_dir(dir);
    }
    Ok(settings)
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}
