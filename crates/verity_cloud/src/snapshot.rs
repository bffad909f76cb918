//! Point-in-time view of a cloud resource.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one resource in the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceTarget {
    pub resource_group: String,
    pub name: String,
    /// Provider resource type, e.g. `Microsoft.Compute/virtualMachineScaleSets`.
    pub resource_type: String,
    pub api_version: String,
}

impl ResourceTarget {
    pub fn new(
        resource_group: impl Into<String>,
        name: impl Into<String>,
        resource_type: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            resource_group: resource_group.into(),
            name: name.into(),
            resource_type: resource_type.into(),
            api_version: api_version.into(),
        }
    }
}

impl fmt::Display for ResourceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_group, self.name)
    }
}

/// Observed attribute with its semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    Enum(String),
}

impl AttributeValue {
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "string",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Enum(_) => "enum",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) | AttributeValue::Enum(s) => f.write_str(s),
            AttributeValue::Integer(i) => write!(f, "{}", i),
        }
    }
}

/// Last path segments that Azure documents as closed value sets.
const ENUM_SEGMENTS: &[&str] = &[
    "tier",
    "mode",
    "osType",
    "priority",
    "evictionPolicy",
    "caching",
    "createOption",
    "storageAccountType",
];

fn is_enum_segment(segment: &str) -> bool {
    segment.ends_with("State") || ENUM_SEGMENTS.contains(&segment)
}

/// Attributes of one resource read at `retrieved_at`, keyed by dotted path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    target: ResourceTarget,
    retrieved_at: DateTime<Utc>,
    attributes: BTreeMap<String, AttributeValue>,
}

impl ResourceSnapshot {
    pub fn new(target: ResourceTarget) -> Self {
        Self {
            target,
            retrieved_at: Utc::now(),
            attributes: BTreeMap::new(),
        }
    }

    /// Flatten an Azure Resource Manager resource document.
    ///
    /// Objects become dotted paths (`sku.capacity`), array elements use their
    /// index (`zones.0`). Integers stay integers; booleans and well-known
    /// state fields become enums; nulls are dropped.
    pub fn from_arm_json(target: ResourceTarget, body: &serde_json::Value) -> Self {
        let mut snapshot = Self::new(target);
        flatten("", body, &mut snapshot.attributes);
        snapshot
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn target(&self) -> &ResourceTarget {
        &self.target
    }

    pub fn retrieved_at(&self) -> DateTime<Utc> {
        self.retrieved_at
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut BTreeMap<String, AttributeValue>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", prefix, key)
        }
    };

    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                flatten(&join(key), child, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(&join(&index.to_string()), child, out);
            }
        }
        serde_json::Value::String(s) => {
            let segment = prefix.rsplit('.').next().unwrap_or(prefix);
            let attr = if is_enum_segment(segment) {
                AttributeValue::Enum(s.clone())
            } else {
                AttributeValue::String(s.clone())
            };
            out.insert(prefix.to_string(), attr);
        }
        serde_json::Value::Number(n) => {
            let attr = match n.as_i64() {
                Some(i) => AttributeValue::Integer(i),
                None => AttributeValue::String(n.to_string()),
            };
            out.insert(prefix.to_string(), attr);
        }
        serde_json::Value::Bool(b) => {
            out.insert(prefix.to_string(), AttributeValue::Enum(b.to_string()));
        }
        serde_json::Value::Null => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> ResourceTarget {
        ResourceTarget::new(
            "rg-agents",
            "vmss-agents",
            "Microsoft.Compute/virtualMachineScaleSets",
            "2019-07-01",
        )
    }

    #[test]
    fn test_flatten_vmss_document() {
        let body = json!({
            "name": "vmss-agents",
            "location": "westeurope",
            "sku": {"name": "Standard_D2s_v3", "tier": "Standard", "capacity": 3},
            "zones": ["1", "2"],
            "properties": {
                "provisioningState": "Succeeded",
                "overprovision": false,
                "platformFaultDomainCount": null,
                "upgradePolicy": {"mode": "Manual"},
                "virtualMachineProfile": {
                    "osProfile": {"computerNamePrefix": "agent"}
                }
            }
        });

        let snapshot = ResourceSnapshot::from_arm_json(target(), &body);

        assert_eq!(snapshot.get("sku.capacity"), Some(&AttributeValue::Integer(3)));
        assert_eq!(
            snapshot.get("sku.name"),
            Some(&AttributeValue::String("Standard_D2s_v3".into()))
        );
        assert_eq!(snapshot.get("sku.tier"), Some(&AttributeValue::Enum("Standard".into())));
        assert_eq!(
            snapshot.get("properties.provisioningState"),
            Some(&AttributeValue::Enum("Succeeded".into()))
        );
        assert_eq!(
            snapshot.get("properties.overprovision"),
            Some(&AttributeValue::Enum("false".into()))
        );
        assert_eq!(
            snapshot.get("properties.upgradePolicy.mode"),
            Some(&AttributeValue::Enum("Manual".into()))
        );
        assert_eq!(
            snapshot.get("properties.virtualMachineProfile.osProfile.computerNamePrefix"),
            Some(&AttributeValue::String("agent".into()))
        );
        assert_eq!(snapshot.get("zones.1"), Some(&AttributeValue::String("2".into())));
        assert_eq!(snapshot.get("properties.platformFaultDomainCount"), None);
    }

    #[test]
    fn test_attribute_display() {
        assert_eq!(AttributeValue::Integer(5).to_string(), "5");
        assert_eq!(AttributeValue::Enum("Succeeded".into()).to_string(), "Succeeded");
        assert_eq!(AttributeValue::String("x".into()).kind(), "string");
        assert_eq!(target().to_string(), "rg-agents/vmss-agents");
    }
}
