//! Error types for the runner module.

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while driving a container runtime.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Container runtime not available: {0}")]
    RuntimeNotAvailable(String),

    #[error("Container execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Image pull failed: {0}")]
    ImagePullFailed(String),

    #[error("Container timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid mount configuration: {0}")]
    InvalidMount(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
