//! Run command - apply, verify, destroy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::{error, warn};

use verity_cloud::{inspector::DEFAULT_RESOURCE_MANAGER_ENDPOINT, ArmInspector, EnvironmentCredentials};
use verity_core::{FatalError, Orchestrator, RetryPolicy, RunOutcome};

use super::{EngineArgs, PlanArgs};
use crate::ExitCodes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Overall timeout in seconds (teardown still runs afterwards)
    #[arg(long, env = "VERITY_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Report format on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Also write the JSON report to this file
    #[arg(long)]
    pub report_file: Option<PathBuf>,

    /// Resource Manager endpoint
    #[arg(long, env = "VERITY_ARM_ENDPOINT", default_value = DEFAULT_RESOURCE_MANAGER_ENDPOINT)]
    pub arm_endpoint: String,

    /// Inspect each resource once, without retrying
    #[arg(long)]
    pub no_retry: bool,
}

pub async fn execute(args: RunArgs) -> Result<u8> {
    let mut plan = args.plan.load()?.with_timeout(args.timeout);
    if args.no_retry {
        plan = plan.with_retry(RetryPolicy::none());
    }
    plan.validate()?;

    let credentials = match EnvironmentCredentials::from_env() {
        Ok(credentials) => credentials,
        Err(e) => {
            error!("{}", e);
            eprintln!("❌ {}", e);
            return Ok(ExitCodes::AUTHENTICATION_FAILURE);
        }
    };
    let inspector = ArmInspector::with_endpoint(&args.arm_endpoint)?;
    let driver = args.engine.driver()?;

    let orchestrator = Orchestrator::new(Arc::new(driver), Arc::new(credentials), Arc::new(inspector));

    let cancel = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => warn!("Interrupted, destroying provisioned resources before exit"),
            Err(_) => std::future::pending::<()>().await,
        }
    };

    let outcome = orchestrator.run_until(&plan, cancel).await;

    match args.format {
        OutputFormat::Text => println!("{}", outcome.report()),
        OutputFormat::Json => println!("{}", outcome.to_json()?),
    }

    Ok(finish(&outcome, args.report_file.as_deref()))
}

/// Write the report file, if requested, and pick the exit code.
///
/// A failed write is logged; it never replaces the run's own exit code.
fn finish(outcome: &RunOutcome, report_file: Option<&Path>) -> u8 {
    if let Some(path) = report_file {
        if let Err(e) = write_report(outcome, path) {
            error!("{:#}", e);
            eprintln!("⚠️  {:#}", e);
        }
    }
    exit_code(outcome)
}

fn write_report(outcome: &RunOutcome, path: &Path) -> Result<()> {
    std::fs::write(path, outcome.to_json()?)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Fatal and verification outcomes take precedence over teardown.
pub fn exit_code(outcome: &RunOutcome) -> u8 {
    match &outcome.fatal {
        Some(FatalError::Authentication(_)) => ExitCodes::AUTHENTICATION_FAILURE,
        Some(FatalError::Provisioning(_) | FatalError::Cancelled | FatalError::TimedOut(_)) => {
            ExitCodes::PROVISIONING_FAILURE
        }
        None if !outcome.report.passed() => ExitCodes::VERIFICATION_FAILURE,
        None if outcome.teardown.is_failed() => ExitCodes::TEARDOWN_FAILURE,
        None => ExitCodes::SUCCESS,
    }
}
