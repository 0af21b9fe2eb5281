use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "svctl")]
#[command(version)]
#[command(about = "Keep a registry of local services running")]
pub struct Cli {
    /// Registry file (defaults to services.yaml in this or a parent directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// State directory for records, counters and logs
    #[arg(long, global = true, env = "SVCTL_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start one service
    Start {
        /// Service name
        name: String,
    },
    /// Stop one service
    Stop {
        /// Service name
        name: String,
        /// Skip the grace period and send SIGKILL right away
        #[arg(short, long)]
        force: bool,
    },
    /// Restart one service
    Restart {
        /// Service name
        name: String,
    },
    /// Start every autostart service in dependency order
    StartAll,
    /// Stop every running service, dependents first
    StopAll,
    /// Stop then start everything
    RestartAll,
    /// Show service status
    Status {
        /// Only this service
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the health monitor in the foreground
    Monitor {
        /// Also write the monitor's log to <state_dir>/logs/monitor.log
        #[arg(long)]
        log_file: bool,
    },
    /// Install an entry that runs `svctl start-all` at login
    SetupAutostart {
        /// linux, macos or windows (defaults to this host)
        #[arg(long)]
        platform: Option<String>,
    },
    /// Archive the registry, runtime records and recent logs
    Backup,
    /// Show a service's log
    Logs {
        /// Service name (defaults to the monitor's own log)
        name: Option<String>,
        /// Number of lines to show
        #[arg(short = 'n', long)]
        lines: Option<usize>,
        /// Follow log output
        #[arg(short, long)]
        follow: bool,
    },
    /// Remove stale records, counters and monitor state
    Clean,
    /// Check the registry for errors
    Validate,
}

impl Commands {
    /// Commands that only inspect or wind down existing state, so a registry
    /// that fails validation must not lock them out.
    pub fn tolerates_invalid_registry(&self) -> bool {
        matches!(
            self,
            Commands::Stop { .. }
                | Commands::StopAll
                | Commands::Status { .. }
                | Commands::Logs { .. }
                | Commands::Clean
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn stop_accepts_force() {
        let cli = Cli::try_parse_from(["svctl", "stop", "api", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Stop { ref name, force: true } if name == "api"));
    }

    #[test]
    fn start_requires_a_name() {
        let err = Cli::try_parse_from(["svctl", "start"]).err().unwrap();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["svctl", "status", "--json", "-c", "x.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.yaml")));
        assert!(matches!(cli.command, Commands::Status { name: None, json: true }));
    }

    #[test]
    fn only_draining_commands_tolerate_an_invalid_registry() {
        for args in [
            vec!["svctl", "stop", "api"],
            vec!["svctl", "stop-all"],
            vec!["svctl", "status"],
            vec!["svctl", "logs", "api"],
            vec!["svctl", "clean"],
        ] {
            let cli = Cli::try_parse_from(args.clone()).unwrap();
            assert!(cli.command.tolerates_invalid_registry(), "{:?}", args);
        }
        for args in [
            vec!["svctl", "start", "api"],
            vec!["svctl", "start-all"],
            vec!["svctl", "restart-all"],
            vec!["svctl", "monitor"],
            vec!["svctl", "backup"],
        ] {
            let cli = Cli::try_parse_from(args.clone()).unwrap();
            assert!(!cli.command.tolerates_invalid_registry(), "{:?}", args);
        }
    }
}
