use super::LlmBackend;
use crate::error::EnrichError;
use async_trait::async_trait;
use tokio::time::{timeout, Duration};

const DEFAULT_CLI_TIMEOUT_SECS: u64 = 120;

/// External AI command line tool, prompt passed as the last argument
pub struct CliBackend {
    command: Vec<String>,
    timeout_secs: u64,
}

impl CliBackend {
    pub fn new(command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            command,
            timeout_secs,
        }
    }

    /// Timeout from `RISKMAP_CLI_TIMEOUT`
    pub fn from_env(command: Vec<String>) -> Self {
        let timeout_secs = std::env::var("RISKMAP_CLI_TIMEOUT")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_CLI_TIMEOUT_SECS);
        Self::new(command, timeout_secs)
    }
}

#[async_trait]
impl LlmBackend for CliBackend {
    async fn complete(&self, prompt: &str) -> Result<String, EnrichError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| EnrichError::Unavailable("empty CLI command".to_string()))?;

        let run = tokio::process::Command::new(program)
            .args(args)
            .arg(prompt)
            .kill_on_drop(true)
            .output();
        let output = match timeout(Duration::from_secs(self.timeout_secs), run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(EnrichError::Unavailable(format!("{program}: {e}"))),
            Err(_) => return Err(EnrichError::Timeout(self.timeout_secs)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnrichError::Request(format!(
                "CLI command failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(EnrichError::InvalidResponse(
                "CLI command returned empty output".to_string(),
            ));
        }
        Ok(stdout)
    }

    fn name(&self) -> &str {
        "cli"
    }
}
