//! # verity_runner
//!
//! Container execution layer for verity.
//!
//! Infrastructure tooling (Terraform) never runs from the host toolchain;
//! every invocation happens inside a pinned container image so that a
//! verification run behaves the same on a laptop and in CI.
//!
//! # Features
//!
//! - **CLI Runner**: docker or podman CLI, auto-detected
//! - **Cancellation**: containers started by a dropped run are force-removed
//! - **CI Integration**: timestamped log lines when `CI` is set
//! - **Mock Runner**: scripted responses for tests without a container runtime
//!
//! # Example
//!
//! ```rust,no_run
//! use verity_runner::{CliRunner, CliRunnerOptions, ContainerConfig, ContainerRunner, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = CliRunner::new(CliRunnerOptions::default())?;
//!
//!     let config = ContainerConfig::new("hashicorp/terraform")
//!         .tag("1.6")
//!         .workdir("/workspace")
//!         .command(vec!["version".to_string()]);
//!
//!     let result = runner.run_container(&config, &RunConfig::default()).await?;
//!     println!("Exit code: {}", result.exit_code);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod mock;
pub mod runner;

pub use cli::{CliRunner, CliRunnerOptions, ContainerRuntime};
pub use config::{CommonImages, ContainerConfig, MountConfig, RunConfig};
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use runner::{ContainerRunner, ExecutionResult};
