//! Outputs produced by a completed apply.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::IacResult;

/// A single output value, rendered to a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputValue {
    pub value: String,
    #[serde(default)]
    pub sensitive: bool,
}

/// Output name to value mapping of one successful apply.
///
/// Built once, never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSet {
    values: BTreeMap<String, OutputValue>,
}

#[derive(Deserialize)]
struct RawOutput {
    #[serde(default)]
    sensitive: bool,
    value: serde_json::Value,
}

impl OutputSet {
    /// Parse the document printed by `terraform output -json`.
    ///
    /// Strings are taken verbatim, numbers and booleans by their literal
    /// form, lists and maps as compact JSON.
    pub fn from_terraform_json(json: &str) -> IacResult<Self> {
        let trimmed = json.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let raw: BTreeMap<String, RawOutput> = serde_json::from_str(trimmed)?;
        let values = raw
            .into_iter()
            .map(|(name, output)| {
                let value = OutputValue {
                    value: render(output.value),
                    sensitive: output.sensitive,
                };
                (name, value)
            })
            .collect();

        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.value.as_str())
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|v| v.sensitive)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for OutputSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(k, v)| {
                (
                    k.into(),
                    OutputValue {
                        value: v.into(),
                        sensitive: false,
                    },
                )
            })
            .collect();
        Self { values }
    }
}

fn render(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TF_OUTPUT: &str = r#"{
        "resource_group_name": {"sensitive": false, "type": "string", "value": "rg-agents"},
        "vmss_capacity": {"sensitive": false, "type": "number", "value": 3},
        "vmss_zones": {"sensitive": false, "type": ["list", "string"], "value": ["1", "2"]},
        "admin_password": {"sensitive": true, "type": "string", "value": "s3cret"},
        "enabled": {"sensitive": false, "type": "bool", "value": true}
    }"#;

    #[test]
    fn test_parse_terraform_output() {
        let outputs = OutputSet::from_terraform_json(TF_OUTPUT).unwrap();

        assert_eq!(outputs.len(), 5);
        assert_eq!(outputs.get("resource_group_name"), Some("rg-agents"));
        assert_eq!(outputs.get("vmss_capacity"), Some("3"));
        assert_eq!(outputs.get("vmss_zones"), Some(r#"["1","2"]"#));
        assert_eq!(outputs.get("enabled"), Some("true"));
        assert!(outputs.is_sensitive("admin_password"));
        assert!(!outputs.is_sensitive("vmss_capacity"));
        assert_eq!(outputs.get("missing"), None);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(OutputSet::from_terraform_json("").unwrap().is_empty());
        assert!(OutputSet::from_terraform_json("{}\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(OutputSet::from_terraform_json("Error: no state").is_err());
    }

    #[test]
    fn test_from_iterator() {
        let outputs: OutputSet = [("vmss_name", "agents")].into_iter().collect();
        assert!(outputs.contains("vmss_name"));
        assert_eq!(outputs.keys().collect::<Vec<_>>(), vec!["vmss_name"]);
    }
}
