//! Error types for the verification lifecycle.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while extracting outputs, verifying checks or
/// loading a verification plan.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Missing output '{key}': {reason}")]
    MissingOutput { key: String, reason: String },

    #[error("Malformed output '{key}': {reason}")]
    MalformedOutput { key: String, reason: String },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Provisioning error: {0}")]
    Iac(#[from] verity_iac::IacError),

    #[error("Cloud error: {0}")]
    Cloud(#[from] verity_cloud::CloudError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plan parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
