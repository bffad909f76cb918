//! Terraform runner for containerized execution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use verity_runner::config::CommonImages;
use verity_runner::{ContainerConfig, ContainerRunner, ExecutionResult, MountConfig, RunConfig};

use crate::driver::ProvisioningDriver;
use crate::error::{IacError, IacResult};
use crate::outputs::OutputSet;
use crate::run::ProvisioningRun;

const CONTAINER_WORKDIR: &str = "/workspace";

/// Result of a Terraform operation.
#[derive(Debug)]
pub struct TerraformResult {
    pub success: bool,
    pub stdout: String,
    pub output: String,
    pub exit_code: i64,
    /// Most relevant line of a failure, for error messages.
    pub summary: String,
}

impl From<ExecutionResult> for TerraformResult {
    fn from(result: ExecutionResult) -> Self {
        let summary = result
            .error_summary()
            .unwrap_or_else(|| "no output".to_string());
        Self {
            success: result.success(),
            output: result.combined_output(),
            stdout: result.stdout,
            exit_code: result.exit_code,
            summary,
        }
    }
}

/// Terraform runner that executes commands in containers.
pub struct TerraformRunner {
    runner: Arc<dyn ContainerRunner>,
    image: String,
    tag: String,
    env: BTreeMap<String, String>,
    timeout_seconds: u64,
    stream_logs: bool,
}

impl TerraformRunner {
    /// Create a new Terraform runner.
    pub fn new(runner: Arc<dyn ContainerRunner>) -> Self {
        let mut env = BTreeMap::new();
        env.insert("TF_IN_AUTOMATION".to_string(), "1".to_string());
        env.insert("TF_INPUT".to_string(), "0".to_string());

        Self {
            runner,
            image: CommonImages::TERRAFORM.to_string(),
            tag: CommonImages::TERRAFORM_TAG.to_string(),
            env,
            timeout_seconds: 1800, // 30 minutes; scale sets are slow
            stream_logs: false,
        }
    }

    /// Set custom Terraform image.
    pub fn with_image(mut self, image: impl Into<String>, tag: impl Into<String>) -> Self {
        self.image = image.into();
        self.tag = tag.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Forward host environment variables whose name starts with one of
    /// `prefixes` (the provider reads its credentials from them).
    pub fn pass_through_env(mut self, prefixes: &[&str]) -> Self {
        for (key, value) in std::env::vars() {
            if prefixes.iter().any(|p| key.starts_with(p)) {
                self.env.insert(key, value);
            }
        }
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn stream_logs(mut self, enabled: bool) -> Self {
        self.stream_logs = enabled;
        self
    }

    /// Run terraform init.
    pub async fn init(&self, working_dir: &Path) -> IacResult<TerraformResult> {
        info!("Running terraform init in {:?}", working_dir);
        self.run_command(working_dir, &["init", "-input=false", "-no-color"], &BTreeMap::new())
            .await
    }

    /// Run terraform apply.
    pub async fn apply(
        &self,
        working_dir: &Path,
        vars: &BTreeMap<String, String>,
    ) -> IacResult<TerraformResult> {
        info!("Running terraform apply in {:?}", working_dir);
        self.run_command(
            working_dir,
            &["apply", "-auto-approve", "-input=false", "-no-color"],
            vars,
        )
        .await
    }

    /// Run terraform output -json.
    pub async fn output_json(&self, working_dir: &Path) -> IacResult<TerraformResult> {
        debug!("Reading terraform outputs in {:?}", working_dir);
        self.run_command(working_dir, &["output", "-json", "-no-color"], &BTreeMap::new())
            .await
    }

    /// Run terraform destroy.
    pub async fn destroy(
        &self,
        working_dir: &Path,
        vars: &BTreeMap<String, String>,
    ) -> IacResult<TerraformResult> {
        info!("Running terraform destroy in {:?}", working_dir);
        self.run_command(
            working_dir,
            &[
                "destroy",
                "-auto-approve",
                "-input=false",
                "-no-color",
                "-lock-timeout=120s",
            ],
            vars,
        )
        .await
    }

    fn resolve_dir(working_dir: &Path) -> IacResult<PathBuf> {
        working_dir
            .canonicalize()
            .map_err(|_| IacError::TemplateNotFound(working_dir.to_path_buf()))
    }

    /// Build the argument list: the subcommand followed by `-var` pairs.
    pub fn command_args(args: &[&str], vars: &BTreeMap<String, String>) -> Vec<String> {
        let mut command: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        for (key, value) in vars {
            command.push("-var".to_string());
            command.push(format!("{}={}", key, value));
        }
        command
    }

    async fn run_command(
        &self,
        working_dir: &Path,
        args: &[&str],
        vars: &BTreeMap<String, String>,
    ) -> IacResult<TerraformResult> {
        let host_dir = Self::resolve_dir(working_dir)?;

        let mut config = ContainerConfig::new(&self.image)
            .tag(&self.tag)
            .workdir(CONTAINER_WORKDIR)
            .name_prefix("verity-tf")
            .mount(MountConfig::new(host_dir, CONTAINER_WORKDIR))
            .command(Self::command_args(args, vars));
        for (key, value) in &self.env {
            config = config.env(key, value);
        }

        let run_config = RunConfig::default()
            .timeout(self.timeout_seconds)
            .stream_logs(self.stream_logs);

        debug!("Executing terraform {:?}", args);

        let result = self.runner.run_container(&config, &run_config).await?;
        Ok(result.into())
    }
}

/// Provisioning driver backed by Terraform.
pub struct TerraformDriver {
    runner: TerraformRunner,
}

impl TerraformDriver {
    pub fn new(runner: TerraformRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ProvisioningDriver for TerraformDriver {
    async fn apply(&self, run: &ProvisioningRun) -> IacResult<OutputSet> {
        let dir = run.template_dir();

        let init = self.runner.init(dir).await?;
        if !init.success {
            return Err(IacError::InitFailed(init.summary));
        }

        let apply = self.runner.apply(dir, run.vars()).await?;
        if !apply.success {
            return Err(IacError::ApplyFailed(apply.summary));
        }

        let output = self.runner.output_json(dir).await?;
        if !output.success {
            return Err(IacError::OutputFailed(output.summary));
        }

        let outputs = OutputSet::from_terraform_json(&output.stdout)?;
        for key in run.declared_outputs() {
            if !outputs.contains(key) {
                warn!("Template did not produce declared output '{}'", key);
            }
        }

        info!(
            "Apply of {:?} complete ({} outputs)",
            dir,
            outputs.len()
        );
        Ok(outputs)
    }

    async fn destroy(&self, run: &ProvisioningRun) -> IacResult<()> {
        let dir = run.template_dir();

        // Destroy may run after a failed apply that never initialized.
        let init = self.runner.init(dir).await?;
        if !init.success {
            return Err(IacError::DestroyFailed(format!("init: {}", init.summary)));
        }

        let destroy = self.runner.destroy(dir, run.vars()).await?;
        if !destroy.success {
            return Err(IacError::DestroyFailed(destroy.summary));
        }

        info!("Destroy of {:?} complete", dir);
        Ok(())
    }
}
