//! Destroy command - Tear down a plan's template without verifying.

use anyhow::Result;
use clap::Args;
use tracing::{error, info};

use verity_core::destroy_plan;

use super::{EngineArgs, PlanArgs};
use crate::ExitCodes;

#[derive(Args, Debug)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    #[command(flatten)]
    pub engine: EngineArgs,
}

pub async fn execute(args: DestroyArgs) -> Result<u8> {
    let plan = args.plan.load()?;
    let driver = args.engine.driver()?;

    info!("Destroying resources of plan '{}'", plan.name);
    match destroy_plan(&driver, &plan).await {
        Ok(()) => {
            println!("✅ Destroyed resources of {}", plan.template_dir.display());
            Ok(ExitCodes::SUCCESS)
        }
        Err(e) => {
            error!("Destroy failed: {}", e);
            println!("❌ Destroy failed: {}", e);
            Ok(ExitCodes::TEARDOWN_FAILURE)
        }
    }
}
