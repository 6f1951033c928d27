use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Captured result of one shell command. A non-zero exit code is data, not an
/// error; the session keeps going either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs a literal command string through `sh -c`. The command text is not
/// sanitized or sandboxed; the caller owns that trust boundary.
pub async fn run(command: &str) -> Result<ShellOutput> {
    debug!(command, "executing shell command");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await
        .with_context(|| format!("failed to spawn shell for: {command}"))?;

    Ok(ShellOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        // Killed-by-signal has no code; report -1 rather than pretending success.
        code: output.status.code().unwrap_or(-1),
    })
}
