//! CLI command definitions.
//!
//! This module defines the command structure for the verity CLI and the
//! argument groups shared between commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use verity_core::VerificationPlan;
use verity_iac::{TerraformDriver, TerraformRunner};
use verity_runner::{CliRunner, CliRunnerOptions, ContainerRuntime};

pub mod check_plan;
pub mod destroy;
pub mod run;

/// verity - deploy, verify and tear down infrastructure templates
#[derive(Parser)]
#[command(name = "verity")]
#[command(version, about = "verity - acceptance runner for infrastructure templates")]
#[command(long_about = r#"
verity provisions a Terraform template, reads the live resources back from
the cloud control plane, compares them to the outputs the template declared,
and always destroys what it created.

COMMANDS:
  run         → Apply, verify, destroy
  check-plan  → Validate a verification plan offline
  destroy     → Tear down a plan's template after an interrupted run

CREDENTIALS:
  ARM_SUBSCRIPTION_ID, ARM_TENANT_ID, ARM_CLIENT_ID, ARM_CLIENT_SECRET
  (AZURE_* names are accepted as fallbacks)

EXIT CODES:
  0 - Passed
  1 - General error
  2 - Invalid arguments or plan
  3 - Verification failure
  4 - Authentication failure
  5 - Provisioning failure, cancelled or timed out
  6 - Teardown failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a template, verify the live resources, destroy
    Run(run::RunArgs),

    /// Load and validate a verification plan
    #[command(name = "check-plan")]
    CheckPlan(check_plan::CheckPlanArgs),

    /// Destroy the resources of a plan's template
    Destroy(destroy::DestroyArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Plan file location and overrides.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Verification plan file (YAML)
    #[arg(short, long, env = "VERITY_PLAN")]
    pub plan: PathBuf,

    /// Override or add a template variable (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Override the plan's template directory
    #[arg(long)]
    pub template_dir: Option<PathBuf>,
}

impl PlanArgs {
    pub fn load(&self) -> Result<VerificationPlan> {
        let mut plan = VerificationPlan::load(&self.plan)
            .with_context(|| format!("Failed to load plan {}", self.plan.display()))?;
        if let Some(dir) = &self.template_dir {
            plan = plan.with_template_dir(dir);
        }
        Ok(plan.with_vars(self.vars.iter().cloned()))
    }
}

/// Terraform execution settings.
#[derive(Args, Debug)]
pub struct EngineArgs {
    /// Container runtime (auto-detected when omitted)
    #[arg(long, env = "VERITY_RUNTIME")]
    pub runtime: Option<ContainerRuntime>,

    /// Terraform image
    #[arg(long, default_value = verity_runner::CommonImages::TERRAFORM)]
    pub terraform_image: String,

    /// Terraform image tag
    #[arg(long, default_value = verity_runner::CommonImages::TERRAFORM_TAG)]
    pub terraform_tag: String,

    /// Timeout for a single terraform command, in seconds
    #[arg(long, default_value_t = 1800)]
    pub terraform_timeout: u64,

    /// Stream terraform output to the log as it runs
    #[arg(long)]
    pub stream_logs: bool,
}

impl EngineArgs {
    pub fn driver(&self) -> Result<TerraformDriver> {
        let mut options = CliRunnerOptions::default();
        if let Some(runtime) = self.runtime {
            options = options.prefer(runtime);
        }
        let runner = CliRunner::new(options).context("No container runtime available")?;

        let terraform = TerraformRunner::new(Arc::new(runner))
            .with_image(&self.terraform_image, &self.terraform_tag)
            .pass_through_env(&["ARM_"])
            .with_timeout(self.terraform_timeout)
            .stream_logs(self.stream_logs);
        Ok(TerraformDriver::new(terraform))
    }
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(parse_var("capacity=3").unwrap(), ("capacity".into(), "3".into()));
        assert_eq!(parse_var("tags={a=b}").unwrap(), ("tags".into(), "{a=b}".into()));
        assert!(parse_var("capacity").is_err());
        assert!(parse_var("=3").is_err());
    }

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "verity",
            "run",
            "--plan",
            "plans/vmss.yaml",
            "--var",
            "capacity=5",
            "--runtime",
            "podman",
            "--format",
            "json",
            "--no-retry",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.plan.vars, vec![("capacity".to_string(), "5".to_string())]);
                assert_eq!(args.engine.runtime, Some(ContainerRuntime::Podman));
                assert_eq!(args.engine.terraform_image, "hashicorp/terraform");
                assert!(args.no_retry);
            }
            _ => panic!("expected run command"),
        }
    }
}
