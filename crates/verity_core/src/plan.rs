//! Verification plan files.
//!
//! A plan names the template to provision, the outputs it must declare and,
//! per resource, the checks that compare those outputs to the live state:
//!
//! ```yaml
//! name: vmss-capacity
//! template_dir: ./Test
//! vars:
//!   location: westeurope
//! expected_outputs: [resource_group_name, vmss_name, vmss_capacity]
//! targets:
//!   - name: scale-set
//!     resource_type: Microsoft.Compute/virtualMachineScaleSets
//!     api_version: "2019-07-01"
//!     resource_group_output: resource_group_name
//!     resource_name_output: vmss_name
//!     checks:
//!       - name: capacity
//!         expected: vmss_capacity
//!         observed: sku.capacity
//!         compare: int_equals
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use verity_cloud::ResourceTarget;
use verity_iac::ProvisioningRun;

use crate::error::{CoreError, CoreResult};
use crate::extract::OutputExtractor;
use crate::retry::RetryPolicy;
use crate::verify::CheckSpec;

/// One resource to inspect and the checks to run against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub name: String,
    pub resource_type: String,
    pub api_version: String,
    /// Output holding the resource group name.
    pub resource_group_output: String,
    /// Output holding the resource name.
    pub resource_name_output: String,
    pub checks: Vec<CheckSpec>,
}

impl TargetSpec {
    /// Build the resource identity from the run's outputs.
    pub fn resolve(&self, extractor: &OutputExtractor<'_>) -> CoreResult<ResourceTarget> {
        let group = non_empty(extractor, &self.resource_group_output)?;
        let name = non_empty(extractor, &self.resource_name_output)?;
        Ok(ResourceTarget::new(group, name, &self.resource_type, &self.api_version))
    }
}

fn non_empty<'a>(extractor: &OutputExtractor<'a>, key: &str) -> CoreResult<&'a str> {
    let value = extractor.extract(key)?;
    if value.trim().is_empty() {
        return Err(CoreError::MalformedOutput {
            key: key.to_string(),
            reason: "empty value".to_string(),
        });
    }
    Ok(value)
}

/// A deploy, verify and teardown plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationPlan {
    pub name: String,
    /// Template directory; relative paths are resolved against the plan file.
    pub template_dir: PathBuf,
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    pub expected_outputs: Vec<String>,
    pub targets: Vec<TargetSpec>,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Overall run timeout in seconds, teardown excluded.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl VerificationPlan {
    /// Load and validate a plan file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        debug!("Loading plan from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml(&content, base_dir)
    }

    /// Parse and validate a plan, resolving `template_dir` against `base_dir`.
    pub fn from_yaml(content: &str, base_dir: &Path) -> CoreResult<Self> {
        let mut plan: Self = serde_yaml::from_str(content)?;
        if plan.template_dir.is_relative() {
            plan.template_dir = base_dir.join(&plan.template_dir);
        }
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |msg: String| Err(CoreError::InvalidPlan(msg));

        if self.name.trim().is_empty() {
            return invalid("plan name is empty".to_string());
        }
        if self.targets.is_empty() {
            return invalid("plan declares no targets".to_string());
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".to_string());
        }
        if self.timeout_seconds == Some(0) {
            return invalid("timeout_seconds must be at least 1".to_string());
        }

        let declared: HashSet<&str> = self.expected_outputs.iter().map(String::as_str).collect();
        let require_declared = |key: &str, context: &str| -> CoreResult<()> {
            if declared.contains(key) {
                Ok(())
            } else {
                invalid(format!("{} uses output '{}' not listed in expected_outputs", context, key))
            }
        };

        for target in &self.targets {
            if target.checks.is_empty() {
                return invalid(format!("target '{}' has no checks", target.name));
            }
            require_declared(&target.resource_group_output, &format!("target '{}'", target.name))?;
            require_declared(&target.resource_name_output, &format!("target '{}'", target.name))?;

            let mut names = HashSet::new();
            for check in &target.checks {
                if !names.insert(check.name.as_str()) {
                    return invalid(format!(
                        "target '{}' has duplicate check '{}'",
                        target.name, check.name
                    ));
                }
                require_declared(&check.expected, &format!("check '{}'", check.name))?;
            }
        }

        Ok(())
    }

    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = dir.into();
        self
    }

    /// Override or add input variables.
    pub fn with_vars<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.vars.extend(vars);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, seconds: Option<u64>) -> Self {
        if seconds.is_some() {
            self.timeout_seconds = seconds;
        }
        self
    }

    /// A fresh provisioning run for this plan.
    pub fn provisioning_run(&self) -> ProvisioningRun {
        ProvisioningRun::new(&self.template_dir)
            .with_vars(self.vars.clone())
            .declare_outputs(self.expected_outputs.iter().cloned())
    }

    pub fn check_count(&self) -> usize {
        self.targets.iter().map(|t| t.checks.len()).sum()
    }
}
