//! CLI-based container runner supporting Docker and Podman.
//!
//! Containers are driven through the `docker` / `podman` command line with
//! automatic detection. Every container gets a generated name so that a run
//! interrupted mid-flight (timeout, cancellation) can force-remove what it
//! started instead of leaving a Terraform process holding the state lock.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::{ContainerConfig, RunConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{ContainerRunner, ExecutionResult};

/// Container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    Docker,
    Podman,
}

impl ContainerRuntime {
    /// Get the CLI command name.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

impl std::str::FromStr for ContainerRuntime {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            other => Err(RunnerError::RuntimeNotAvailable(format!(
                "unknown container runtime '{}'",
                other
            ))),
        }
    }
}

/// One line of container output.
#[derive(Debug, Clone)]
struct LogLine {
    timestamp: chrono::DateTime<Utc>,
    stream: LogStream,
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// CLI-based container runner options.
#[derive(Debug, Clone)]
pub struct CliRunnerOptions {
    /// Preferred runtime (if not set, auto-detect)
    pub preferred_runtime: Option<ContainerRuntime>,
    /// CI mode (timestamped log lines)
    pub ci_mode: bool,
}

impl Default for CliRunnerOptions {
    fn default() -> Self {
        Self {
            preferred_runtime: None,
            ci_mode: std::env::var("CI").is_ok(),
        }
    }
}

impl CliRunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ci_mode(mut self) -> Self {
        self.ci_mode = true;
        self
    }

    pub fn prefer(mut self, runtime: ContainerRuntime) -> Self {
        self.preferred_runtime = Some(runtime);
        self
    }
}

/// CLI-based container runner.
pub struct CliRunner {
    runtime: ContainerRuntime,
    options: CliRunnerOptions,
}

impl CliRunner {
    /// Create a new CLI runner with automatic runtime detection.
    pub fn new(options: CliRunnerOptions) -> RunnerResult<Self> {
        let runtime = Self::detect_runtime(&options)?;
        info!("Using container runtime: {}", runtime);

        Ok(Self { runtime, options })
    }

    /// Create a runner with a specific runtime.
    pub fn with_runtime(runtime: ContainerRuntime, options: CliRunnerOptions) -> Self {
        Self { runtime, options }
    }

    /// Detect available container runtime.
    pub fn detect_runtime(options: &CliRunnerOptions) -> RunnerResult<ContainerRuntime> {
        if let Some(preferred) = options.preferred_runtime {
            if Self::is_runtime_available(preferred) {
                return Ok(preferred);
            }
            warn!(
                "Preferred runtime {} not available, trying alternatives",
                preferred
            );
        }

        if Self::is_runtime_available(ContainerRuntime::Docker) {
            return Ok(ContainerRuntime::Docker);
        }

        if Self::is_runtime_available(ContainerRuntime::Podman) {
            return Ok(ContainerRuntime::Podman);
        }

        Err(RunnerError::RuntimeNotAvailable(
            "Neither Docker nor Podman is available".to_string(),
        ))
    }

    fn is_runtime_available(runtime: ContainerRuntime) -> bool {
        std::process::Command::new(runtime.command())
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Get the current runtime.
    pub fn runtime(&self) -> ContainerRuntime {
        self.runtime
    }

    async fn pull_image(&self, image: &str, tag: &str) -> RunnerResult<()> {
        let full_image = format!("{}:{}", image, tag);
        info!("Pulling image: {}", full_image);

        let output = Command::new(self.runtime.command())
            .args(["pull", &full_image])
            .output()
            .await
            .map_err(|e| RunnerError::ImagePullFailed(e.to_string()))?;

        if output.status.success() {
            info!("Successfully pulled: {}", full_image);
            Ok(())
        } else {
            Err(RunnerError::ImagePullFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ))
        }
    }

    async fn image_exists(&self, image: &str, tag: &str) -> RunnerResult<bool> {
        let full_image = format!("{}:{}", image, tag);
        let status = Command::new(self.runtime.command())
            .args(["image", "inspect", &full_image])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| RunnerError::ExecutionFailed(e.to_string()))?;

        Ok(status.success())
    }

    fn container_name(prefix: Option<&str>) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", prefix.unwrap_or("verity"), &id[..8])
    }

    /// Build the command line arguments for running a container.
    fn build_run_args(&self, config: &ContainerConfig, name: &str) -> Vec<String> {
        let mut args = vec!["run".to_string()];

        if config.auto_remove {
            args.push("--rm".to_string());
        }

        args.push("--name".to_string());
        args.push(name.to_string());

        if let Some(workdir) = &config.workdir {
            args.push("-w".to_string());
            args.push(workdir.clone());
        }

        for (key, value) in &config.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        for mount in &config.mounts {
            args.push("-v".to_string());
            args.push(format!("{}:{}", mount.source.to_string_lossy(), mount.target));
        }

        args.push(config.full_image());
        args.extend(config.command.iter().cloned());

        args
    }

    /// Format command for logging, with environment values masked.
    fn format_command(&self, args: &[String]) -> String {
        let mut cmd = self.runtime.command().to_string();
        let mut mask_next = false;
        for arg in args {
            let shown = if mask_next {
                match arg.split_once('=') {
                    Some((key, _)) => format!("{}=***", key),
                    None => arg.clone(),
                }
            } else {
                arg.clone()
            };
            mask_next = arg == "-e";

            if shown.contains(' ') {
                cmd.push_str(&format!(" '{}'", shown));
            } else {
                cmd.push(' ');
                cmd.push_str(&shown);
            }
        }
        cmd
    }

    fn sink(&self, run_config: &RunConfig) -> LogSink {
        LogSink {
            stream_logs: run_config.stream_logs,
            ci_mode: self.options.ci_mode,
        }
    }

    /// Execute the runtime CLI and capture output, streaming if requested.
    async fn execute(
        &self,
        args: &[String],
        run_config: &RunConfig,
    ) -> RunnerResult<(i64, String, String)> {
        let mut cmd = Command::new(self.runtime.command());
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Executing: {}", self.format_command(args));

        let mut child = cmd.spawn().map_err(|e| {
            RunnerError::ExecutionFailed(format!("Failed to spawn {}: {}", self.runtime, e))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stderr was not captured".to_string()))?;

        let stdout_task = tokio::spawn(collect_lines(stdout, LogStream::Stdout, self.sink(run_config)));
        let stderr_task = tokio::spawn(collect_lines(stderr, LogStream::Stderr, self.sink(run_config)));

        let status = if run_config.timeout_seconds > 0 {
            let limit = Duration::from_secs(run_config.timeout_seconds);
            match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(RunnerError::Timeout(run_config.timeout_seconds));
                }
            }
        } else {
            child.wait().await?
        };

        let stdout_output = stdout_task.await.unwrap_or_default();
        let stderr_output = stderr_task.await.unwrap_or_default();

        Ok((status.code().unwrap_or(-1) as i64, stdout_output, stderr_output))
    }
}

#[derive(Clone)]
struct LogSink {
    stream_logs: bool,
    ci_mode: bool,
}

impl LogSink {
    fn emit(&self, line: LogLine) {
        // stdout is reserved for reports
        if self.ci_mode {
            eprintln!(
                "[{}] [{}] {}",
                line.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                line.stream,
                line.message
            );
        } else {
            eprintln!("{}", line.message);
        }
    }
}

async fn collect_lines<R>(reader: R, stream: LogStream, sink: LogSink) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut output = String::new();

    while let Ok(Some(line)) = lines.next_line().await {
        output.push_str(&line);
        output.push('\n');
        if sink.stream_logs {
            sink.emit(LogLine {
                timestamp: Utc::now(),
                stream,
                message: line,
            });
        }
    }

    output
}

/// Force-removes a named container unless disarmed.
///
/// Dropping the future of an in-flight `run_container` kills the CLI client,
/// but the container itself keeps running; this reaps it.
struct ContainerReaper {
    runtime: ContainerRuntime,
    name: String,
    armed: bool,
}

impl ContainerReaper {
    fn new(runtime: ContainerRuntime, name: &str) -> Self {
        Self {
            runtime,
            name: name.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerReaper {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Force-removing interrupted container {}", self.name);
        let removed = std::process::Command::new(self.runtime.command())
            .args(["rm", "-f", &self.name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = removed {
            error!("Failed to remove container {}: {}", self.name, e);
        }
    }
}

#[async_trait]
impl ContainerRunner for CliRunner {
    async fn run_container(
        &self,
        config: &ContainerConfig,
        run_config: &RunConfig,
    ) -> RunnerResult<ExecutionResult> {
        for mount in &config.mounts {
            if !mount.source.exists() {
                return Err(RunnerError::InvalidMount(format!(
                    "{} does not exist",
                    mount.source.display()
                )));
            }
        }

        if !self.image_exists(&config.image, &config.tag).await? {
            self.pull_image(&config.image, &config.tag).await?;
        }

        let name = Self::container_name(config.name_prefix.as_deref());
        let args = self.build_run_args(config, &name);
        debug!("Running container {} ({})", name, config.full_image());

        let mut reaper = ContainerReaper::new(self.runtime, &name);
        let started_at = Utc::now();
        let (exit_code, stdout, stderr) = self.execute(&args, run_config).await?;
        let finished_at = Utc::now();
        reaper.disarm();

        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        if exit_code == 0 {
            debug!("Container {} completed in {}ms", name, duration_ms);
        } else {
            warn!(
                "Container {} exited with code {} after {}ms",
                name, exit_code, duration_ms
            );
        }

        Ok(ExecutionResult {
            container_id: name,
            exit_code,
            stdout,
            stderr,
            started_at,
            finished_at,
            duration_ms,
        })
    }
}
