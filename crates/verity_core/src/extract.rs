//! Named output lookup for a completed apply.

use verity_iac::{OutputSet, ProvisioningRun};

use crate::error::{CoreError, CoreResult};

/// Reads outputs of one run.
///
/// A key must be declared by the run (when the run declares any outputs) and
/// present in the output set. Values are returned as-is; numeric parsing
/// happens only in [`extract_int`](Self::extract_int).
#[derive(Debug, Clone, Copy)]
pub struct OutputExtractor<'a> {
    run: &'a ProvisioningRun,
    outputs: &'a OutputSet,
}

impl<'a> OutputExtractor<'a> {
    pub fn new(run: &'a ProvisioningRun, outputs: &'a OutputSet) -> Self {
        Self { run, outputs }
    }

    pub fn run(&self) -> &'a ProvisioningRun {
        self.run
    }

    pub fn outputs(&self) -> &'a OutputSet {
        self.outputs
    }

    pub fn extract(&self, key: &str) -> CoreResult<&'a str> {
        if !self.run.declared_outputs().is_empty() && !self.run.declares(key) {
            return Err(CoreError::MissingOutput {
                key: key.to_string(),
                reason: "not declared by the template".to_string(),
            });
        }

        self.outputs.get(key).ok_or_else(|| CoreError::MissingOutput {
            key: key.to_string(),
            reason: "not present after apply".to_string(),
        })
    }

    /// Extract and parse a base-10 integer.
    pub fn extract_int(&self, key: &str) -> CoreResult<i64> {
        let value = self.extract(key)?;
        value.parse::<i64>().map_err(|_| CoreError::MalformedOutput {
            key: key.to_string(),
            reason: format!("'{}' is not an integer", value),
        })
    }

    /// Value to show in reports; sensitive outputs are masked.
    pub fn display_value(&self, key: &str) -> Option<String> {
        let value = self.outputs.get(key)?;
        if self.outputs.is_sensitive(key) {
            Some("(sensitive)".to_string())
        } else {
            Some(value.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (ProvisioningRun, OutputSet) {
        let run = ProvisioningRun::new("./Test").declare_outputs(["vmss_capacity", "vmss_name", "zone"]);
        let outputs: OutputSet = [("vmss_capacity", "3"), ("vmss_name", "vmss-agents"), ("extra", "x")]
            .into_iter()
            .collect();
        (run, outputs)
    }

    #[test]
    fn test_extract_declared_and_present() {
        let (run, outputs) = fixture();
        let extractor = OutputExtractor::new(&run, &outputs);
        assert_eq!(extractor.extract("vmss_name").unwrap(), "vmss-agents");
        assert_eq!(extractor.extract_int("vmss_capacity").unwrap(), 3);
    }

    #[test]
    fn test_extract_missing() {
        let (run, outputs) = fixture();
        let extractor = OutputExtractor::new(&run, &outputs);

        match extractor.extract("extra").unwrap_err() {
            CoreError::MissingOutput { reason, .. } => assert!(reason.contains("not declared")),
            other => panic!("unexpected error: {other}"),
        }
        match extractor.extract("zone").unwrap_err() {
            CoreError::MissingOutput { reason, .. } => assert!(reason.contains("not present")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extract_int_malformed() {
        let (run, outputs) = fixture();
        let extractor = OutputExtractor::new(&run, &outputs);
        let err = extractor.extract_int("vmss_name").unwrap_err();
        assert!(matches!(err, CoreError::MalformedOutput { ref key, .. } if key == "vmss_name"));
    }

    #[test]
    fn test_undeclared_run_reads_any_output() {
        let run = ProvisioningRun::new("./Test");
        let outputs: OutputSet = [("extra", "x")].into_iter().collect();
        assert_eq!(OutputExtractor::new(&run, &outputs).extract("extra").unwrap(), "x");
    }
}
