use std::collections::BTreeSet;
use std::net::TcpListener;
use tokio::process::Command;

/// A process found listening on a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortHolder {
    pub pid: u32,
    pub name: String,
}

/// True when binding the port on both loopback and the wildcard address fails
/// for at least one of them. On macOS 127.0.0.1 can bind while 0.0.0.0 is
/// taken, so both are tried.
pub fn is_port_in_use(port: u16) -> bool {
    let localhost_free = TcpListener::bind(("127.0.0.1", port)).is_ok();
    let any_free = TcpListener::bind(("0.0.0.0", port)).is_ok();
    !(localhost_free && any_free)
}

/// Every process holding `port`, from `ss` and then `lsof`.
pub async fn find_port_holders(port: u16) -> Vec<PortHolder> {
    let mut pids = BTreeSet::new();

    pids.extend(ss_pids(port).await);

    if let Some(out) = run_capture(
        "lsof",
        &[
            "-nP".to_string(),
            format!("-iTCP:{}", port),
            "-sTCP:LISTEN".to_string(),
            "-t".to_string(),
        ],
    )
    .await
    {
        pids.extend(out.lines().filter_map(|l| l.trim().parse::<u32>().ok()));
    }

    pids.into_iter()
        .map(|pid| PortHolder {
            pid,
            name: process_name(pid).unwrap_or_else(|| "unknown".to_string()),
        })
        .collect()
}

async fn run_capture(program: &str, args: &[String]) -> Option<String> {
    let output = Command::new(program).args(args).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(target_os = "linux")]
async fn ss_pids(port: u16) -> BTreeSet<u32> {
    run_capture("ss", &["-tlnpH".to_string(), format!("sport = :{}", port)])
        .await
        .map(|out| parse_ss_pids(&out))
        .unwrap_or_default()
}

#[cfg(not(target_os = "linux"))]
async fn ss_pids(_port: u16) -> BTreeSet<u32> {
    BTreeSet::new()
}

/// Pull `pid=N` entries out of `ss -p` output.
pub(crate) fn parse_ss_pids(output: &str) -> BTreeSet<u32> {
    output
        .split(|c: char| c == ',' || c.is_whitespace() || c == '(' || c == ')')
        .filter_map(|part| part.strip_prefix("pid="))
        .filter_map(|pid| pid.parse::<u32>().ok())
        .collect()
}

#[cfg(target_os = "linux")]
fn process_name(pid: u32) -> Option<String> {
    std::fs::read_to_string(format!("/proc/{}/comm", pid))
        .ok()
        .map(|s| s.trim().to_string())
}

#[cfg(not(target_os = "linux"))]
fn process_name(pid: u32) -> Option<String> {
    let output = std::process::Command::new("ps")
        .args(["-o", "comm=", "-p", &pid.to_string()])
        .output()
        .ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}
