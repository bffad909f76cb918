//! Mock provisioning driver for testing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::driver::ProvisioningDriver;
use crate::error::{IacError, IacResult};
use crate::outputs::OutputSet;
use crate::run::ProvisioningRun;

/// Driver call, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCall {
    Apply,
    Destroy,
}

/// Scripted provisioning driver.
///
/// `apply` returns the configured outputs (or failure); `destroy` succeeds
/// unless told otherwise. Every call is recorded.
#[derive(Clone, Default)]
pub struct MockDriver {
    outputs: Arc<RwLock<OutputSet>>,
    apply_failure: Arc<RwLock<Option<String>>>,
    destroy_failure: Arc<RwLock<Option<String>>>,
    apply_delay: Arc<RwLock<Option<Duration>>>,
    calls: Arc<RwLock<Vec<DriverCall>>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outputs(self, outputs: OutputSet) -> Self {
        *self.outputs.write() = outputs;
        self
    }

    pub fn fail_apply(self, message: impl Into<String>) -> Self {
        *self.apply_failure.write() = Some(message.into());
        self
    }

    pub fn fail_destroy(self, message: impl Into<String>) -> Self {
        *self.destroy_failure.write() = Some(message.into());
        self
    }

    /// Make `apply` take this long, to exercise timeouts and cancellation.
    pub fn with_apply_delay(self, delay: Duration) -> Self {
        *self.apply_delay.write() = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.read().clone()
    }

    pub fn apply_count(&self) -> usize {
        self.count(DriverCall::Apply)
    }

    pub fn destroy_count(&self) -> usize {
        self.count(DriverCall::Destroy)
    }

    fn count(&self, call: DriverCall) -> usize {
        self.calls.read().iter().filter(|c| **c == call).count()
    }
}

#[async_trait]
impl ProvisioningDriver for MockDriver {
    async fn apply(&self, _run: &ProvisioningRun) -> IacResult<OutputSet> {
        self.calls.write().push(DriverCall::Apply);

        let delay = *self.apply_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.apply_failure.read().clone();
        if let Some(msg) = failure {
            return Err(IacError::ApplyFailed(msg));
        }
        Ok(self.outputs.read().clone())
    }

    async fn destroy(&self, _run: &ProvisioningRun) -> IacResult<()> {
        self.calls.write().push(DriverCall::Destroy);

        let failure = self.destroy_failure.read().clone();
        if let Some(msg) = failure {
            return Err(IacError::DestroyFailed(msg));
        }
        Ok(())
    }
}
