//! # verity_core
//!
//! The deploy, verify and teardown lifecycle.
//!
//! # Architecture
//!
//! - **Extractor**: reads declared outputs of a completed apply
//! - **Verification engine**: compares outputs to observed attributes under
//!   explicitly typed checks
//! - **Orchestrator**: authenticates, applies once, inspects with bounded
//!   retry, verifies, and destroys exactly once on every path after apply
//! - **Plan**: YAML description of a template and its checks
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use verity_core::{Orchestrator, VerificationPlan};
//!
//! let plan = VerificationPlan::load(Path::new("plans/vmss.yaml"))?;
//! let orchestrator = Orchestrator::new(driver, credentials, inspector);
//! let cancel = async {
//!     let _ = tokio::signal::ctrl_c().await;
//! };
//! let outcome = orchestrator.run_until(&plan, cancel).await;
//! println!("{}", outcome.report());
//! ```

pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod plan;
pub mod report;
pub mod retry;
pub mod verify;

pub use error::{CoreError, CoreResult};
pub use extract::OutputExtractor;
pub use orchestrator::{destroy_plan, Orchestrator};
pub use plan::{TargetSpec, VerificationPlan};
pub use report::{CheckResult, FailureKind, FatalError, RunOutcome, TeardownStatus, VerificationReport};
pub use retry::{inspect_with_retry, RetryPolicy};
pub use verify::{verify, CheckSpec, Comparison};
