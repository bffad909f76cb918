//! Identity of a single apply invocation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One provisioning of a template: where it lives, the variables it is
/// applied with, and the outputs it is expected to declare.
///
/// A run is created at the start of a verification and torn down at its end;
/// the same value is handed to both `apply` and `destroy` so that teardown
/// sees exactly the variables the apply saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningRun {
    id: Uuid,
    template_dir: PathBuf,
    vars: BTreeMap<String, String>,
    declared_outputs: Vec<String>,
}

impl ProvisioningRun {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            template_dir: template_dir.into(),
            vars: BTreeMap::new(),
            declared_outputs: Vec::new(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Declare output keys the template is expected to produce. Duplicates
    /// are ignored; declaration order is kept.
    pub fn declare_outputs<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            let key = key.into();
            if !self.declared_outputs.contains(&key) {
                self.declared_outputs.push(key);
            }
        }
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn declared_outputs(&self) -> &[String] {
        &self.declared_outputs
    }

    /// Whether `key` is one of the declared outputs.
    pub fn declares(&self, key: &str) -> bool {
        self.declared_outputs.iter().any(|k| k == key)
    }

    /// Short id used in container names and log lines.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}
