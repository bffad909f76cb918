//! Container runner trait and types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ContainerConfig, RunConfig};
use crate::error::RunnerResult;

/// Result of container execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Container name or ID
    pub container_id: String,
    /// Exit code from the container
    pub exit_code: i64,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Execution start time
    pub started_at: DateTime<Utc>,
    /// Execution end time
    pub finished_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Check if execution was successful (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Summary of a failure for error messages.
    ///
    /// The last `Error:` paragraph, joined onto one line, with stderr searched
    /// before stdout. Diagnostics end with a source excerpt, so the final line
    /// alone rarely names the cause. Falls back to the last non-empty line.
    pub fn error_summary(&self) -> Option<String> {
        [&self.stderr, &self.stdout]
            .into_iter()
            .find_map(|text| error_paragraph(text))
            .or_else(|| {
                self.stderr
                    .lines()
                    .rev()
                    .chain(self.stdout.lines().rev())
                    .map(diagnostic_text)
                    .find(|l| !l.is_empty())
                    .map(str::to_string)
            })
    }
}

fn diagnostic_text(line: &str) -> &str {
    line.trim_start_matches('│').trim()
}

fn error_paragraph(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().map(diagnostic_text).collect();
    let start = lines.iter().rposition(|l| l.starts_with("Error:"))?;
    let paragraph: Vec<&str> = lines[start..].iter().copied().take_while(|l| !l.is_empty()).collect();
    Some(paragraph.join(" "))
}

/// Container runner trait.
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    /// Run a container to completion with the given configuration, pulling
    /// the image first when it is missing.
    ///
    /// A non-zero exit code is not an error; callers inspect
    /// [`ExecutionResult::success`].
    async fn run_container(
        &self,
        config: &ContainerConfig,
        run_config: &RunConfig,
    ) -> RunnerResult<ExecutionResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stdout: &str, stderr: &str) -> ExecutionResult {
        let now = Utc::now();
        ExecutionResult {
            container_id: "test".to_string(),
            exit_code: 1,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_combined_output() {
        assert_eq!(result("out", "").combined_output(), "out");
        assert_eq!(result("", "err").combined_output(), "err");
        assert_eq!(result("out", "err").combined_output(), "out\nerr");
    }

    #[test]
    fn test_error_summary_prefers_stderr() {
        let r = result("plan ok\n", "Error: quota exceeded\n\n");
        assert_eq!(r.error_summary().as_deref(), Some("Error: quota exceeded"));

        let r = result("first\nsecond\n", "");
        assert_eq!(r.error_summary().as_deref(), Some("second"));

        assert_eq!(result("", "").error_summary(), None);
    }

    #[test]
    fn test_error_summary_skips_source_excerpt() {
        let stderr = r#"
Error: creating Linux Virtual Machine Scale Set "vmss-agents"
Code="OperationNotAllowed" Message="Operation could not be completed as it results in exceeding approved standardDSv3Family Cores quota."

  with azurerm_linux_virtual_machine_scale_set.agents,
  on main.tf line 12, in resource "azurerm_linux_virtual_machine_scale_set" "agents":
  12: resource "azurerm_linux_virtual_machine_scale_set" "agents" {

"#;
        let summary = result("", stderr).error_summary().unwrap();
        assert!(summary.starts_with("Error: creating Linux Virtual Machine Scale Set"));
        assert!(summary.contains("Cores quota"));
        assert!(!summary.contains("main.tf"));

        let boxed = "│ Error: Invalid provider configuration\n│ \n│   on main.tf line 1:\n";
        assert_eq!(
            result("", boxed).error_summary().as_deref(),
            Some("Error: Invalid provider configuration")
        );
    }
}
