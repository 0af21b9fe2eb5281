mod autostart;
mod backup;
mod clean;
mod lifecycle;
mod logs;
mod monitor;
mod status;
mod validate;

pub use autostart::run_setup_autostart;
pub use backup::run_backup;
pub use clean::run_clean;
pub use lifecycle::{
    run_restart, run_restart_all, run_start, run_start_all, run_stop, run_stop_all,
};
pub use logs::run_logs;
pub use monitor::run_monitor_command;
pub use status::run_status;
pub use validate::run_validate;
