//! Container configuration types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Bind mount from the host into the container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    /// Host path to mount
    pub source: PathBuf,
    /// Container path to mount to
    pub target: String,
}

impl MountConfig {
    pub fn new(source: PathBuf, target: impl Into<String>) -> Self {
        Self {
            source,
            target: target.into(),
        }
    }
}

/// Container configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Image to use
    pub image: String,
    /// Image tag (default: latest)
    pub tag: String,
    /// Command to run
    pub command: Vec<String>,
    /// Working directory inside container
    pub workdir: Option<String>,
    /// Environment variables, ordered for reproducible command lines
    pub env: BTreeMap<String, String>,
    /// Volume mounts
    pub mounts: Vec<MountConfig>,
    /// Whether to remove container after execution
    pub auto_remove: bool,
    /// Container name prefix
    pub name_prefix: Option<String>,
}

impl ContainerConfig {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            tag: "latest".to_string(),
            command: Vec::new(),
            workdir: None,
            env: BTreeMap::new(),
            mounts: Vec::new(),
            auto_remove: true,
            name_prefix: None,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn command(mut self, cmd: Vec<String>) -> Self {
        self.command = cmd;
        self
    }

    pub fn workdir(mut self, dir: impl Into<String>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn mount(mut self, mount: MountConfig) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// Get the full image name with tag.
    pub fn full_image(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

/// Run configuration with timeouts and log behaviour.
///
/// Missing images are always pulled before the container starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Timeout in seconds (0 = no timeout)
    pub timeout_seconds: u64,
    /// Whether to stream logs while the container runs
    pub stream_logs: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 300, // 5 minutes
            stream_logs: false,
        }
    }
}

impl RunConfig {
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn stream_logs(mut self, enabled: bool) -> Self {
        self.stream_logs = enabled;
        self
    }
}

/// Default image for the provisioning engine.
pub struct CommonImages;

impl CommonImages {
    pub const TERRAFORM: &'static str = "hashicorp/terraform";
    pub const TERRAFORM_TAG: &'static str = "1.6";
}
