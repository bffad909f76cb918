//! Check results, verification reports and run outcomes.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Why a check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Mismatch,
    MissingOutput,
    MalformedOutput,
    MissingAttribute,
    TypeMismatch,
    ResourceNotFound,
    Authorization,
    Inspection,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Mismatch => "mismatch",
            FailureKind::MissingOutput => "missing_output",
            FailureKind::MalformedOutput => "malformed_output",
            FailureKind::MissingAttribute => "missing_attribute",
            FailureKind::TypeMismatch => "type_mismatch",
            FailureKind::ResourceNotFound => "resource_not_found",
            FailureKind::Authorization => "authorization",
            FailureKind::Inspection => "inspection",
        }
    }
}

impl From<&CoreError> for FailureKind {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::MissingOutput { .. } => FailureKind::MissingOutput,
            CoreError::MalformedOutput { .. } => FailureKind::MalformedOutput,
            CoreError::TypeMismatch(_) => FailureKind::TypeMismatch,
            _ => FailureKind::Inspection,
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    /// Expected value, absent when it could not be resolved.
    pub expected: Option<String>,
    /// Observed value, absent when it could not be resolved.
    pub observed: Option<String>,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, expected: impl Into<String>, observed: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected: Some(expected.into()),
            observed: Some(observed.into()),
            passed: true,
            diagnostic: None,
            failure: None,
        }
    }

    /// Both sides resolved but differ.
    pub fn mismatch(name: impl Into<String>, expected: impl Into<String>, observed: impl Into<String>) -> Self {
        let expected = expected.into();
        let observed = observed.into();
        Self {
            name: name.into(),
            diagnostic: Some(format!("expected {}, observed {}", expected, observed)),
            expected: Some(expected),
            observed: Some(observed),
            passed: false,
            failure: Some(FailureKind::Mismatch),
        }
    }

    /// The check could not be evaluated.
    pub fn error(name: impl Into<String>, kind: FailureKind, diagnostic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected: None,
            observed: None,
            passed: false,
            diagnostic: Some(diagnostic.into()),
            failure: Some(kind),
        }
    }

    pub fn with_expected(mut self, expected: Option<String>) -> Self {
        self.expected = expected;
        self
    }

    pub fn with_observed(mut self, observed: Option<String>) -> Self {
        self.observed = observed;
        self
    }
}

/// Ordered check results of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    checks: Vec<CheckResult>,
}

impl VerificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: CheckResult) {
        self.checks.push(result);
    }

    pub fn append(&mut self, other: VerificationReport) {
        self.checks.extend(other.checks);
    }

    pub fn checks(&self) -> &[CheckResult] {
        &self.checks
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// True when at least one check ran and every check passed.
    pub fn passed(&self) -> bool {
        !self.checks.is_empty() && self.checks.iter().all(|c| c.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failures(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }
}

impl FromIterator<CheckResult> for VerificationReport {
    fn from_iter<I: IntoIterator<Item = CheckResult>>(iter: I) -> Self {
        Self {
            checks: iter.into_iter().collect(),
        }
    }
}

/// Error that ended a run before verification could complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FatalError {
    Authentication(String),
    Provisioning(String),
    Cancelled,
    /// Overall timeout, in seconds.
    TimedOut(u64),
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::Authentication(msg) => write!(f, "authentication failed: {}", msg),
            FatalError::Provisioning(msg) => write!(f, "provisioning failed: {}", msg),
            FatalError::Cancelled => f.write_str("run cancelled"),
            FatalError::TimedOut(secs) => write!(f, "run timed out after {}s", secs),
        }
    }
}

/// What happened to the provisioned resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TeardownStatus {
    /// Nothing was provisioned.
    NotRequired,
    Succeeded,
    Failed { message: String },
}

impl TeardownStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, TeardownStatus::Failed { .. })
    }
}

/// Everything a caller needs to know about one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub plan: String,
    pub run_id: Uuid,
    pub template_dir: PathBuf,
    pub report: VerificationReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<FatalError>,
    pub teardown: TeardownStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    /// Passed checks, no fatal error, clean teardown.
    pub fn passed(&self) -> bool {
        self.fatal.is_none() && self.report.passed() && !self.teardown.is_failed()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Generate a human-readable report.
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!("Plan: {} (run {})\n", self.plan, self.run_id));
        report.push_str(&format!("Template: {}\n", self.template_dir.display()));
        report.push_str(&format!(
            "Status: {}\n",
            if self.passed() { "✅ PASSED" } else { "❌ FAILED" }
        ));
        report.push_str(&format!("Duration: {}ms\n", self.duration_ms()));

        if let Some(fatal) = &self.fatal {
            report.push_str(&format!("\nFatal: {}\n", fatal));
        }

        if !self.report.is_empty() {
            report.push_str("\nChecks:\n");
            for check in self.report.checks() {
                let status = if check.passed { "✅" } else { "❌" };
                report.push_str(&format!(
                    "  {} {} - expected: {}, observed: {}\n",
                    status,
                    check.name,
                    check.expected.as_deref().unwrap_or("-"),
                    check.observed.as_deref().unwrap_or("-"),
                ));
                if let Some(diagnostic) = &check.diagnostic {
                    let kind = check.failure.map(|k| k.as_str()).unwrap_or("note");
                    report.push_str(&format!("     {}: {}\n", kind, diagnostic));
                }
            }
        } else if self.fatal.is_none() {
            report.push_str("\nNo checks were executed\n");
        }

        report.push_str(&format!(
            "\nTeardown: {}\n",
            match &self.teardown {
                TeardownStatus::NotRequired => "not required".to_string(),
                TeardownStatus::Succeeded => "✅ destroyed".to_string(),
                TeardownStatus::Failed { message } => format!("❌ FAILED - {}", message),
            }
        ));

        report.push_str(&format!(
            "\nSummary: {}/{} checks passed",
            self.report.passed_count(),
            self.report.len()
        ));

        report
    }
}
