//! Error types for the provisioning driver.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for IaC operations.
pub type IacResult<T> = Result<T, IacError>;

/// Errors that can occur while provisioning or tearing down a template.
#[derive(Error, Debug)]
pub enum IacError {
    #[error("Template directory not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("Terraform init failed: {0}")]
    InitFailed(String),

    #[error("Terraform apply failed: {0}")]
    ApplyFailed(String),

    #[error("Terraform output failed: {0}")]
    OutputFailed(String),

    #[error("Terraform destroy failed: {0}")]
    DestroyFailed(String),

    #[error("Invalid terraform output: {0}")]
    InvalidOutput(String),

    #[error("Runner error: {0}")]
    Runner(#[from] verity_runner::RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for IacError {
    fn from(err: serde_json::Error) -> Self {
        IacError::InvalidOutput(err.to_string())
    }
}
