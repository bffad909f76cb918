//! Provisioning driver trait.

use async_trait::async_trait;

use crate::error::IacResult;
use crate::outputs::OutputSet;
use crate::run::ProvisioningRun;

/// Wraps an infrastructure-as-code engine.
///
/// Both operations block until the engine finishes. Implementations must not
/// retry `apply`.
#[async_trait]
pub trait ProvisioningDriver: Send + Sync {
    /// Provision the template and return its outputs.
    async fn apply(&self, run: &ProvisioningRun) -> IacResult<OutputSet>;

    /// Destroy everything the template provisioned.
    async fn destroy(&self, run: &ProvisioningRun) -> IacResult<()>;
}
