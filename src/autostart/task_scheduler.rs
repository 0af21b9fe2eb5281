use super::{AutostartContext, AutostartStrategy, Platform};
use std::path::PathBuf;

const TASK_NAME: &str = "svctl-autostart";

/// Windows Task Scheduler task triggered at logon.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskSchedulerTask;

impl AutostartStrategy for TaskSchedulerTask {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    /// The `/TR` command line the task runs.
    fn render(&self, ctx: &AutostartContext) -> String {
        format!(
            "\"{}\" --config \"{}\" start-all",
            ctx.exe.display(),
            ctx.registry.display()
        )
    }

    fn target_path(&self, _ctx: &AutostartContext) -> Option<PathBuf> {
        None
    }

    fn activation(&self, ctx: &AutostartContext) -> Vec<Vec<String>> {
        vec![vec![
            "schtasks".into(),
            "/Create".into(),
            "/F".into(),
            "/TN".into(),
            TASK_NAME.into(),
            "/SC".into(),
            "ONLOGON".into(),
            "/TR".into(),
            self.render(ctx),
        ]]
    }
}
