//! Lifecycle orchestrator: authenticate, apply, verify, always destroy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use verity_cloud::{CloudError, CredentialProvider, ResourceInspector, Session};
use verity_iac::{ProvisioningDriver, ProvisioningRun};

use crate::error::{CoreError, CoreResult};
use crate::extract::OutputExtractor;
use crate::plan::{TargetSpec, VerificationPlan};
use crate::report::{CheckResult, FailureKind, FatalError, RunOutcome, TeardownStatus, VerificationReport};
use crate::retry::{inspect_with_retry, RetryPolicy};
use crate::verify::verify_with;

/// Tokens expiring within this window are renewed before inspection.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Tracks whether a provisioned run has been torn down.
///
/// Dropping an armed guard means resources may have leaked; it logs what the
/// operator needs to clean up by hand.
struct TeardownGuard<'a> {
    run: &'a ProvisioningRun,
    armed: bool,
}

impl<'a> TeardownGuard<'a> {
    fn new(run: &'a ProvisioningRun) -> Self {
        Self { run, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            error!(
                "Run {} dropped before teardown; resources of {} may still exist. Run `verity destroy` for this plan.",
                self.run.id(),
                self.run.template_dir().display()
            );
        }
    }
}

/// Sequences one deploy, verify and teardown cycle.
///
/// Holds no per-run state; one orchestrator can drive several runs
/// concurrently.
pub struct Orchestrator {
    driver: Arc<dyn ProvisioningDriver>,
    credentials: Arc<dyn CredentialProvider>,
    inspector: Arc<dyn ResourceInspector>,
}

impl Orchestrator {
    pub fn new(
        driver: Arc<dyn ProvisioningDriver>,
        credentials: Arc<dyn CredentialProvider>,
        inspector: Arc<dyn ResourceInspector>,
    ) -> Self {
        Self {
            driver,
            credentials,
            inspector,
        }
    }

    /// Run the plan to completion.
    pub async fn run(&self, plan: &VerificationPlan) -> RunOutcome {
        self.run_until(plan, std::future::pending()).await
    }

    /// Run the plan, stopping early when `cancel` resolves.
    ///
    /// Once apply has started, destroy runs exactly once before this returns,
    /// whether the run passed, failed, was cancelled or timed out.
    pub async fn run_until<F>(&self, plan: &VerificationPlan, cancel: F) -> RunOutcome
    where
        F: Future<Output = ()>,
    {
        let started_at = Utc::now();
        let run = plan.provisioning_run();
        tokio::pin!(cancel);

        info!(
            "Starting run {} of plan '{}' ({})",
            run.short_id(),
            plan.name,
            run.template_dir().display()
        );

        let outcome = |report, fatal, teardown| RunOutcome {
            plan: plan.name.clone(),
            run_id: run.id(),
            template_dir: run.template_dir().to_path_buf(),
            report,
            fatal,
            teardown,
            started_at,
            finished_at: Utc::now(),
        };

        let session = tokio::select! {
            result = self.credentials.authenticate() => match result {
                Ok(session) => session,
                Err(e) => {
                    error!("Authentication failed, nothing provisioned: {}", e);
                    return outcome(
                        VerificationReport::new(),
                        Some(FatalError::Authentication(e.to_string())),
                        TeardownStatus::NotRequired,
                    );
                }
            },
            _ = &mut cancel => {
                warn!("Run cancelled before provisioning");
                return outcome(VerificationReport::new(), Some(FatalError::Cancelled), TeardownStatus::NotRequired);
            }
        };

        let mut guard = TeardownGuard::new(&run);

        let deadline = async {
            match plan.timeout_seconds {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };

        let (report, fatal) = tokio::select! {
            result = self.provision_and_verify(plan, &run, &session) => result,
            _ = &mut cancel => {
                warn!("Run {} cancelled, tearing down", run.short_id());
                (VerificationReport::new(), Some(FatalError::Cancelled))
            }
            _ = deadline => {
                let secs = plan.timeout_seconds.unwrap_or_default();
                warn!("Run {} timed out after {}s, tearing down", run.short_id(), secs);
                (VerificationReport::new(), Some(FatalError::TimedOut(secs)))
            }
        };

        let teardown = self.teardown(&run).await;
        guard.disarm();

        let outcome = outcome(report, fatal, teardown);
        info!(
            "Run {} finished: {} ({}/{} checks passed)",
            run.short_id(),
            if outcome.passed() { "passed" } else { "failed" },
            outcome.report.passed_count(),
            outcome.report.len()
        );
        outcome
    }

    async fn provision_and_verify(
        &self,
        plan: &VerificationPlan,
        run: &ProvisioningRun,
        session: &Session,
    ) -> (VerificationReport, Option<FatalError>) {
        info!("Applying {}", run.template_dir().display());
        let outputs = match self.driver.apply(run).await {
            Ok(outputs) => outputs,
            Err(e) => {
                error!("Apply failed: {}", e);
                return (VerificationReport::new(), Some(FatalError::Provisioning(e.to_string())));
            }
        };
        info!("Apply complete, {} outputs", outputs.len());

        let refreshed;
        let session = if session.expires_within(Utc::now(), chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)) {
            info!("Access token expired or about to expire, authenticating again");
            match self.credentials.authenticate().await {
                Ok(renewed) => {
                    refreshed = renewed;
                    Ok(&refreshed)
                }
                Err(e) => {
                    error!("Re-authentication after apply failed: {}", e);
                    Err(e)
                }
            }
        } else {
            Ok(session)
        };

        let extractor = OutputExtractor::new(run, &outputs);
        let mut report = VerificationReport::new();
        for target in &plan.targets {
            let checks = match &session {
                Ok(session) => self.verify_target(target, &extractor, session, &plan.retry).await,
                Err(e) => unauthenticated_target(target, &extractor, e),
            };
            report.append(checks);
        }
        (report, None)
    }

    async fn verify_target(
        &self,
        target: &TargetSpec,
        extractor: &OutputExtractor<'_>,
        session: &Session,
        retry: &RetryPolicy,
    ) -> VerificationReport {
        let resource = match target.resolve(extractor) {
            Ok(resource) => resource,
            Err(e) => return unresolved_target(target, &e),
        };

        info!("Inspecting {} ({})", resource, resource.resource_type);
        match inspect_with_retry(self.inspector.as_ref(), session, &resource, retry).await {
            Ok(snapshot) => verify_with(extractor, &snapshot, &target.checks),
            Err(e) => {
                warn!("Inspecting {} failed: {}", resource, e);
                let (kind, diagnostic) = match &e {
                    CloudError::ResourceNotFound { .. } => {
                        (FailureKind::ResourceNotFound, format!("resource not found: {}", resource))
                    }
                    CloudError::Authorization(msg) => (FailureKind::Authorization, format!("not authorized: {}", msg)),
                    other => (FailureKind::Inspection, format!("inspection failed: {}", other)),
                };
                single_failure(format!("resource {}", resource), kind, diagnostic)
            }
        }
    }

    async fn teardown(&self, run: &ProvisioningRun) -> TeardownStatus {
        info!("Destroying resources of run {}", run.short_id());
        match self.driver.destroy(run).await {
            Ok(()) => {
                info!("Teardown complete");
                TeardownStatus::Succeeded
            }
            Err(e) => {
                error!(
                    "Teardown of {} failed, resources may remain: {}",
                    run.template_dir().display(),
                    e
                );
                TeardownStatus::Failed { message: e.to_string() }
            }
        }
    }
}

fn single_failure(name: String, kind: FailureKind, diagnostic: String) -> VerificationReport {
    [CheckResult::error(name, kind, diagnostic)].into_iter().collect()
}

fn unresolved_target(target: &TargetSpec, err: &CoreError) -> VerificationReport {
    warn!("Cannot resolve target '{}': {}", target.name, err);
    single_failure(format!("resolve {}", target.name), FailureKind::from(err), err.to_string())
}

/// The target could not be inspected because no valid session was available.
fn unauthenticated_target(target: &TargetSpec, extractor: &OutputExtractor<'_>, err: &CloudError) -> VerificationReport {
    match target.resolve(extractor) {
        Ok(resource) => single_failure(
            format!("resource {}", resource),
            FailureKind::Inspection,
            format!("inspection failed: {}", err),
        ),
        Err(e) => unresolved_target(target, &e),
    }
}

/// Destroy whatever a plan's template provisioned, without verifying.
///
/// Recovery path after an interrupted run.
pub async fn destroy_plan(driver: &dyn ProvisioningDriver, plan: &VerificationPlan) -> CoreResult<()> {
    let run = plan.provisioning_run();
    info!("Destroying {} for plan '{}'", run.template_dir().display(), plan.name);
    driver.destroy(&run).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use verity_cloud::{AttributeValue, MockCredentials, MockInspection, MockInspector};
    use verity_iac::{DriverCall, MockDriver, OutputSet};

    const PLAN: &str = r#"
name: vmss-capacity
template_dir: ./Test
expected_outputs: [resource_group_name, vmss_name, vmss_capacity]
retry:
  initial_backoff_ms: 1
targets:
  - name: scale-set
    resource_type: Microsoft.Compute/virtualMachineScaleSets
    api_version: "2019-07-01"
    resource_group_output: resource_group_name
    resource_name_output: vmss_name
    checks:
      - name: capacity
        expected: vmss_capacity
        observed: sku.capacity
        compare: int_equals
"#;

    fn plan() -> VerificationPlan {
        VerificationPlan::from_yaml(PLAN, Path::new("/plans")).unwrap()
    }

    fn outputs() -> OutputSet {
        [
            ("resource_group_name", "rg-agents"),
            ("vmss_name", "vmss-agents"),
            ("vmss_capacity", "3"),
        ]
        .into_iter()
        .collect()
    }

    fn orchestrator(driver: &MockDriver, creds: &MockCredentials, inspector: &MockInspector) -> Orchestrator {
        Orchestrator::new(
            Arc::new(driver.clone()),
            Arc::new(creds.clone()),
            Arc::new(inspector.clone()),
        )
    }

    #[tokio::test]
    async fn test_passing_run_tears_down_once() {
        let driver = MockDriver::new().with_outputs(outputs());
        let creds = MockCredentials::new("sub");
        let inspector = MockInspector::new().respond(
            "rg-agents",
            "vmss-agents",
            vec![MockInspection::found([("sku.capacity", AttributeValue::Integer(3))])],
        );

        let outcome = orchestrator(&driver, &creds, &inspector).run(&plan()).await;

        assert!(outcome.passed());
        assert_eq!(outcome.report.len(), 1);
        assert_eq!(driver.calls(), vec![DriverCall::Apply, DriverCall::Destroy]);
        assert_eq!(outcome.teardown, TeardownStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_auth_failure_skips_apply_and_destroy() {
        let driver = MockDriver::new().with_outputs(outputs());
        let creds = MockCredentials::failing("ARM_CLIENT_SECRET is not set");
        let inspector = MockInspector::new();

        let outcome = orchestrator(&driver, &creds, &inspector).run(&plan()).await;

        assert!(matches!(outcome.fatal, Some(FatalError::Authentication(_))));
        assert_eq!(outcome.teardown, TeardownStatus::NotRequired);
        assert!(driver.calls().is_empty());
        assert_eq!(inspector.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_apply_finishes() {
        let driver = MockDriver::new()
            .with_outputs(outputs())
            .with_apply_delay(Duration::from_secs(30));
        let creds = MockCredentials::new("sub");
        let inspector = MockInspector::new();

        let cancel = tokio::time::sleep(Duration::from_millis(20));
        let outcome = orchestrator(&driver, &creds, &inspector)
            .run_until(&plan(), cancel)
            .await;

        assert_eq!(outcome.fatal, Some(FatalError::Cancelled));
        assert_eq!(driver.destroy_count(), 1);
        assert!(outcome.report.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_plan() {
        let driver = MockDriver::new();
        destroy_plan(&driver, &plan()).await.unwrap();
        assert_eq!(driver.calls(), vec![DriverCall::Destroy]);

        let failing = MockDriver::new().fail_destroy("state locked");
        assert!(destroy_plan(&failing, &plan()).await.is_err());
    }
}
