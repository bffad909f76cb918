//! Bounded retry around a single resource inspection.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use verity_cloud::{CloudError, CloudResult, ResourceInspector, ResourceSnapshot, ResourceTarget, Session};

/// Retry policy for control-plane reads.
///
/// Only transient errors are retried, plus "not found" when
/// `retry_not_found` is set (the resource may not be visible yet right after
/// apply). Authorization failures are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt (milliseconds).
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: u32,
    pub retry_not_found: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2_000,
            backoff_factor: 2,
            retry_not_found: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn should_retry(&self, err: &CloudError) -> bool {
        match err {
            CloudError::Transient(_) => true,
            CloudError::ResourceNotFound { .. } => self.retry_not_found,
            _ => false,
        }
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.backoff_factor.max(1)).saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

/// Inspect `target`, retrying per `policy`.
///
/// Returns the last error once attempts are exhausted or the error is not
/// retryable.
pub async fn inspect_with_retry(
    inspector: &dyn ResourceInspector,
    session: &Session,
    target: &ResourceTarget,
    policy: &RetryPolicy,
) -> CloudResult<ResourceSnapshot> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match inspector.inspect(session, target).await {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) if attempt < max_attempts && policy.should_retry(&e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    "Inspecting {} failed (attempt {}/{}): {}; retrying in {:?}",
                    target, attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
