//! # verity_iac
//!
//! Provisioning driver for verity.
//!
//! This crate applies and destroys infrastructure templates and reads the
//! outputs a completed apply produced. Terraform is executed inside a
//! container through `verity_runner`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use verity_iac::{ProvisioningDriver, ProvisioningRun, TerraformDriver, TerraformRunner};
//! use verity_runner::{CliRunner, CliRunnerOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = Arc::new(CliRunner::new(CliRunnerOptions::default())?);
//! let driver = TerraformDriver::new(TerraformRunner::new(runner).pass_through_env(&["ARM_"]));
//!
//! let run = ProvisioningRun::new("./Test").declare_outputs(["vmss_name", "vmss_capacity"]);
//! let outputs = driver.apply(&run).await?;
//! println!("capacity = {:?}", outputs.get("vmss_capacity"));
//! driver.destroy(&run).await?;
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod error;
pub mod mock;
pub mod outputs;
pub mod run;
pub mod terraform;

pub use driver::ProvisioningDriver;
pub use error::{IacError, IacResult};
pub use mock::{DriverCall, MockDriver};
pub use outputs::{OutputSet, OutputValue};
pub use run::ProvisioningRun;
pub use terraform::{TerraformDriver, TerraformResult, TerraformRunner};
