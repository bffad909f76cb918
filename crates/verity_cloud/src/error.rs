//! Cloud error types.

use thiserror::Error;

/// Result type alias for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors raised by credential providers and resource inspectors.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Resource not found: {group}/{name}")]
    ResourceNotFound { group: String, name: String },

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Transient API error: {0}")]
    Transient(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl CloudError {
    /// Errors that may go away on their own (throttling, 5xx, network).
    pub fn is_transient(&self) -> bool {
        matches!(self, CloudError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::ResourceNotFound { .. })
    }
}

impl From<reqwest::Error> for CloudError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            CloudError::Transient(err.to_string())
        } else if err.is_decode() {
            CloudError::InvalidResponse(err.to_string())
        } else {
            CloudError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CloudError {
    fn from(err: serde_json::Error) -> Self {
        CloudError::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(CloudError::Transient("429".into()).is_transient());
        assert!(!CloudError::Authorization("403".into()).is_transient());

        let not_found = CloudError::ResourceNotFound {
            group: "rg".into(),
            name: "vmss".into(),
        };
        assert!(not_found.is_not_found());
        assert_eq!(not_found.to_string(), "Resource not found: rg/vmss");
    }
}
