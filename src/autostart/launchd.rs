use super::{xml_escape, AutostartContext, AutostartStrategy, Platform};
use std::path::PathBuf;

const LABEL: &str = "com.svctl.autostart";

/// launchd LaunchAgent under `~/Library/LaunchAgents`, run at load.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchdAgent;

impl LaunchdAgent {
    fn log_path(ctx: &AutostartContext) -> PathBuf {
        ctx.home.join("Library/Logs/svctl-autostart.log")
    }
}

impl AutostartStrategy for LaunchdAgent {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    fn render(&self, ctx: &AutostartContext) -> String {
        let exe = xml_escape(&ctx.exe.display().to_string());
        let registry = xml_escape(&ctx.registry.display().to_string());
        let working_dir = xml_escape(&ctx.working_dir.display().to_string());
        let log = xml_escape(&Self::log_path(ctx).display().to_string());

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{exe}</string>
        <string>--config</string>
        <string>{registry}</string>
        <string>start-all</string>
    </array>
    <key>WorkingDirectory</key>
    <string>{working_dir}</string>
    <key>RunAtLoad</key>
    <true/>
    <key>StandardOutPath</key>
    <string>{log}</string>
    <key>StandardErrorPath</key>
    <string>{log}</string>
</dict>
</plist>
"#,
            label = LABEL,
        )
    }

    fn target_path(&self, ctx: &AutostartContext) -> Option<PathBuf> {
        Some(
            ctx.home
                .join("Library/LaunchAgents")
                .join(format!("{}.plist", LABEL)),
        )
    }

    fn activation(&self, ctx: &AutostartContext) -> Vec<Vec<String>> {
        let Some(path) = self.target_path(ctx) else {
            return Vec::new();
        };
        vec![vec![
            "launchctl".into(),
            "load".into(),
            "-w".into(),
            path.display().to_string(),
        ]]
    }
}
