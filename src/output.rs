use std::io::Write;

/// Abstraction over user-facing output.
///
/// Command modules write through this trait instead of `println!` so tests can
/// capture what a command printed, and so `--json` output is never mixed with
/// human-readable lines.
pub trait UserOutput: Send + Sync {
    /// Informational line (e.g. "Stopping all services...").
    fn status(&self, message: &str);

    fn success(&self, message: &str);

    fn warning(&self, message: &str);

    fn error(&self, message: &str);

    /// Machine-readable payload, written verbatim to stdout.
    fn data(&self, payload: &str);

    fn blank(&self);
}

/// Standard CLI output: stdout for results, stderr for problems.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        println!("\x1b[32m{}\x1b[0m", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("\x1b[33m{}\x1b[0m", message);
    }

    fn error(&self, message: &str) {
        eprintln!("\x1b[31m{}\x1b[0m", message);
    }

    fn data(&self, payload: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", payload);
        let _ = stdout.flush();
    }

    fn blank(&self) {
        println!();
    }
}

/// Records every line in memory, tagged by kind.
#[cfg(test)]
#[derive(Default)]
pub struct CapturedOutput {
    lines: std::sync::Mutex<Vec<(&'static str, String)>>,
}

#[cfg(test)]
impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured lines as `(kind, message)` pairs.
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Messages of one kind (`"status"`, `"success"`, `"warning"`, `"error"`, `"data"`).
    pub fn of_kind(&self, kind: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, m)| m)
            .collect()
    }

    fn push(&self, kind: &'static str, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((kind, message.to_string()));
        }
    }
}

#[cfg(test)]
impl UserOutput for CapturedOutput {
    fn status(&self, message: &str) {
        self.push("status", message);
    }
    fn success(&self, message: &str) {
        self.push("success", message);
    }
    fn warning(&self, message: &str) {
        self.push("warning", message);
    }
    fn error(&self, message: &str) {
        self.push("error", message);
    }
    fn data(&self, payload: &str) {
        self.push("data", payload);
    }
    fn blank(&self) {}
}
