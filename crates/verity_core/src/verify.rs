//! Verification engine: expected outputs against observed attributes.

use serde::{Deserialize, Serialize};
use verity_cloud::{AttributeValue, ResourceSnapshot};
use verity_iac::{OutputSet, ProvisioningRun};

use crate::error::CoreError;
use crate::extract::OutputExtractor;
use crate::report::{CheckResult, FailureKind, VerificationReport};

/// How a check compares its two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Exact string equality; the attribute must be a string.
    StringEquals,
    /// Integer equality; the output must parse as i64, the attribute must be
    /// an integer or a string that parses as one.
    IntEquals,
    /// ASCII case-insensitive equality; the attribute must be an enum or a
    /// string.
    EnumEquals,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::StringEquals => "string_equals",
            Comparison::IntEquals => "int_equals",
            Comparison::EnumEquals => "enum_equals",
        }
    }
}

/// One declared check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub name: String,
    /// Output key holding the expected value.
    pub expected: String,
    /// Dotted attribute path in the resource snapshot.
    pub observed: String,
    pub compare: Comparison,
}

impl CheckSpec {
    pub fn new(
        name: impl Into<String>,
        expected: impl Into<String>,
        observed: impl Into<String>,
        compare: Comparison,
    ) -> Self {
        Self {
            name: name.into(),
            expected: expected.into(),
            observed: observed.into(),
            compare,
        }
    }
}

/// Evaluate every check in order against one snapshot.
///
/// Produces exactly one result per check; failures never stop the remaining
/// checks.
pub fn verify(
    run: &ProvisioningRun,
    expected: &OutputSet,
    observed: &ResourceSnapshot,
    checks: &[CheckSpec],
) -> VerificationReport {
    let extractor = OutputExtractor::new(run, expected);
    verify_with(&extractor, observed, checks)
}

pub(crate) fn verify_with(
    extractor: &OutputExtractor<'_>,
    observed: &ResourceSnapshot,
    checks: &[CheckSpec],
) -> VerificationReport {
    checks
        .iter()
        .map(|check| evaluate(extractor, observed, check))
        .collect()
}

fn evaluate(extractor: &OutputExtractor<'_>, snapshot: &ResourceSnapshot, check: &CheckSpec) -> CheckResult {
    let expected = match extractor.extract(&check.expected) {
        Ok(value) => value,
        Err(e) => return CheckResult::error(&check.name, FailureKind::from(&e), e.to_string()),
    };
    let expected_display = extractor.display_value(&check.expected);

    let attribute = match snapshot.get(&check.observed) {
        Some(attr) => attr,
        None => {
            return CheckResult::error(
                &check.name,
                FailureKind::MissingAttribute,
                format!("attribute '{}' not present on {}", check.observed, snapshot.target()),
            )
            .with_expected(expected_display);
        }
    };
    let observed_display = attribute.to_string();

    match compare(check, extractor, expected, attribute) {
        Ok(true) => CheckResult::pass(&check.name, expected_display.unwrap_or_default(), observed_display),
        Ok(false) => CheckResult::mismatch(&check.name, expected_display.unwrap_or_default(), observed_display),
        Err(e) => CheckResult::error(&check.name, FailureKind::TypeMismatch, e.to_string())
            .with_expected(expected_display)
            .with_observed(Some(observed_display)),
    }
}

fn compare(
    check: &CheckSpec,
    extractor: &OutputExtractor<'_>,
    expected: &str,
    observed: &AttributeValue,
) -> Result<bool, CoreError> {
    let mismatch = || {
        CoreError::TypeMismatch(format!(
            "{} cannot compare {} attribute '{}'",
            check.compare.as_str(),
            observed.kind(),
            check.observed
        ))
    };

    match (check.compare, observed) {
        (Comparison::StringEquals, AttributeValue::String(actual)) => Ok(expected == actual.as_str()),
        (Comparison::IntEquals, _) => {
            let expected = extractor
                .extract_int(&check.expected)
                .map_err(|e| CoreError::TypeMismatch(e.to_string()))?;
            let actual = match observed {
                AttributeValue::Integer(i) => *i,
                AttributeValue::String(s) => s.parse::<i64>().map_err(|_| {
                    CoreError::TypeMismatch(format!(
                        "attribute '{}' value '{}' is not an integer",
                        check.observed, s
                    ))
                })?,
                AttributeValue::Enum(_) => return Err(mismatch()),
            };
            Ok(expected == actual)
        }
        (Comparison::EnumEquals, AttributeValue::Enum(actual) | AttributeValue::String(actual)) => {
            Ok(expected.eq_ignore_ascii_case(actual))
        }
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verity_cloud::ResourceTarget;

    fn snapshot() -> ResourceSnapshot {
        ResourceSnapshot::new(ResourceTarget::new(
            "rg-agents",
            "vmss-agents",
            "Microsoft.Compute/virtualMachineScaleSets",
            "2019-07-01",
        ))
        .with_attribute("sku.capacity", AttributeValue::Integer(3))
        .with_attribute("sku.name", AttributeValue::String("Standard_D2s_v3".into()))
        .with_attribute("properties.provisioningState", AttributeValue::Enum("Succeeded".into()))
        .with_attribute("properties.platformFaultDomainCount", AttributeValue::String("5".into()))
    }

    fn run() -> ProvisioningRun {
        ProvisioningRun::new("./Test").declare_outputs(["count", "sku", "state", "domains", "name"])
    }

    fn outputs(count: &str) -> OutputSet {
        [
            ("count", count),
            ("sku", "Standard_D2s_v3"),
            ("state", "succeeded"),
            ("domains", "5"),
            ("name", "vmss-agents"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_matching_capacity_passes() {
        let checks = [CheckSpec::new("capacity", "count", "sku.capacity", Comparison::IntEquals)];
        let report = verify(&run(), &outputs("3"), &snapshot(), &checks);

        assert_eq!(report.len(), 1);
        assert!(report.passed());
        assert_eq!(report.checks()[0], CheckResult::pass("capacity", "3", "3"));
    }

    #[test]
    fn test_capacity_mismatch() {
        let checks = [CheckSpec::new("capacity", "count", "sku.capacity", Comparison::IntEquals)];
        let observed = snapshot().with_attribute("sku.capacity", AttributeValue::Integer(5));
        let report = verify(&run(), &outputs("3"), &observed, &checks);

        assert!(!report.passed());
        let result = &report.checks()[0];
        assert_eq!(result.expected.as_deref(), Some("3"));
        assert_eq!(result.observed.as_deref(), Some("5"));
        assert_eq!(result.failure, Some(FailureKind::Mismatch));
    }

    #[test]
    fn test_all_checks_run_in_order() {
        let checks = [
            CheckSpec::new("missing", "absent", "sku.capacity", Comparison::IntEquals),
            CheckSpec::new("sku", "sku", "sku.name", Comparison::StringEquals),
            CheckSpec::new("state", "state", "properties.provisioningState", Comparison::EnumEquals),
            CheckSpec::new("domains", "domains", "properties.platformFaultDomainCount", Comparison::IntEquals),
            CheckSpec::new("no-attr", "name", "properties.zones", Comparison::StringEquals),
        ];
        let report = verify(&run(), &outputs("3"), &snapshot(), &checks);

        let names: Vec<&str> = report.checks().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["missing", "sku", "state", "domains", "no-attr"]);

        let passed: Vec<bool> = report.checks().iter().map(|c| c.passed).collect();
        assert_eq!(passed, [false, true, true, true, false]);
        assert_eq!(report.checks()[0].failure, Some(FailureKind::MissingOutput));
        assert_eq!(report.checks()[4].failure, Some(FailureKind::MissingAttribute));
        assert_eq!(report.checks()[4].expected.as_deref(), Some("vmss-agents"));
    }

    #[test]
    fn test_missing_output_is_not_a_mismatch() {
        let run = ProvisioningRun::new("./Test").declare_outputs(["count"]);
        let outputs = OutputSet::default();
        let checks = [CheckSpec::new("capacity", "count", "sku.capacity", Comparison::IntEquals)];

        let report = verify(&run, &outputs, &snapshot(), &checks);
        let result = &report.checks()[0];
        assert!(!result.passed);
        assert_eq!(result.failure, Some(FailureKind::MissingOutput));
        assert_eq!(result.expected, None);
    }

    #[test]
    fn test_type_mismatches() {
        let checks = [
            CheckSpec::new("not-int", "sku", "sku.capacity", Comparison::IntEquals),
            CheckSpec::new("enum-as-string", "state", "properties.provisioningState", Comparison::StringEquals),
            CheckSpec::new("int-as-enum", "count", "sku.capacity", Comparison::EnumEquals),
            CheckSpec::new("enum-as-int", "count", "properties.provisioningState", Comparison::IntEquals),
        ];
        let report = verify(&run(), &outputs("3"), &snapshot(), &checks);

        assert_eq!(report.len(), 4);
        for result in report.checks() {
            assert!(!result.passed, "{} should fail", result.name);
            assert_eq!(result.failure, Some(FailureKind::TypeMismatch), "{}", result.name);
        }
    }

    #[test]
    fn test_enum_comparison_is_case_insensitive() {
        let checks = [CheckSpec::new("state", "state", "properties.provisioningState", Comparison::EnumEquals)];
        let report = verify(&run(), &outputs("3"), &snapshot(), &checks);
        assert!(report.passed());
        assert_eq!(report.checks()[0].observed.as_deref(), Some("Succeeded"));
    }

    #[test]
    fn test_no_checks_never_passes() {
        let report = verify(&run(), &outputs("3"), &snapshot(), &[]);
        assert!(report.is_empty());
        assert!(!report.passed());
    }

    #[test]
    fn test_comparison_tags() {
        let check: CheckSpec = serde_json::from_str(
            r#"{"name":"c","expected":"count","observed":"sku.capacity","compare":"int_equals"}"#,
        )
        .unwrap();
        assert_eq!(check.compare, Comparison::IntEquals);
    }
}
