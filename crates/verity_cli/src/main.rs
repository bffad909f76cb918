//! verity CLI - Main entry point.
//!
//! Exit codes:
//! - 0: All checks passed and resources were destroyed
//! - 1: General error
//! - 2: Invalid arguments or plan
//! - 3: Verification failure
//! - 4: Authentication failure
//! - 5: Provisioning failure, cancellation or timeout
//! - 6: Teardown failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, LogFormat};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VERIFICATION_FAILURE: u8 = 3;
    pub const AUTHENTICATION_FAILURE: u8 = 4;
    pub const PROVISIONING_FAILURE: u8 = 5;
    pub const TEARDOWN_FAILURE: u8 = 6;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::CheckPlan(args) => commands::check_plan::execute(args).await,
        Commands::Destroy(args) => commands::destroy::execute(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Logs go to stderr so that stdout carries only the report.
fn init_logging(cli: &Cli) {
    let default_filter = if cli.verbose {
        "verity=debug,info"
    } else if cli.quiet {
        "warn"
    } else {
        "verity=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json = cli.log_format == LogFormat::Json;
    let log_result = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_target(false).with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr)))
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    use verity_core::CoreError;

    match e.downcast_ref::<CoreError>() {
        Some(CoreError::InvalidPlan(_) | CoreError::Yaml(_) | CoreError::Io(_)) => ExitCodes::INVALID_ARGS,
        _ => ExitCodes::GENERAL_ERROR,
    }
}
