use super::{AutostartContext, AutostartStrategy, Platform};
use std::path::PathBuf;

const USER_SYSTEMD_DIR: &str = ".config/systemd/user";
const UNIT_NAME: &str = "svctl.service";

const UNIT_TEMPLATE: &str = "\
[Unit]\n\
Description=svctl: start registered local services\n\
After=network-online.target\n\
Wants=network-online.target\n\
\n\
[Service]\n\
Type=oneshot\n\
RemainAfterExit=yes\n\
WorkingDirectory=%working_dir%\n\
ExecStart=\"%exe_path%\" --config \"%registry%\" start-all\n\
ExecStop=\"%exe_path%\" --config \"%registry%\" stop-all\n\
Environment=RUST_LOG=info\n\
\n\
[Install]\n\
WantedBy=default.target\n\
";

/// systemd user unit under `~/.config/systemd/user`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemdUserUnit;

impl AutostartStrategy for SystemdUserUnit {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn render(&self, ctx: &AutostartContext) -> String {
        UNIT_TEMPLATE
            .replace("%exe_path%", &ctx.exe.display().to_string())
            .replace("%registry%", &ctx.registry.display().to_string())
            .replace("%working_dir%", &ctx.working_dir.display().to_string())
    }

    fn target_path(&self, ctx: &AutostartContext) -> Option<PathBuf> {
        Some(ctx.home.join(USER_SYSTEMD_DIR).join(UNIT_NAME))
    }

    fn activation(&self, _ctx: &AutostartContext) -> Vec<Vec<String>> {
        vec![
            vec!["systemctl".into(), "--user".into(), "daemon-reload".into()],
            vec![
                "systemctl".into(),
                "--user".into(),
                "enable".into(),
                UNIT_NAME.into(),
            ],
        ]
    }
}
