//! Platform-side view of a compute resource.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::ResourceId;
use super::node::{NodeSpec, Role};

/// Lifecycle state the platform reports for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    Provisioning,
    Running,
    Stopped,
    Failed,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What the platform reports about one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: ResourceId,
    pub name: String,
    /// Role tag attached at creation. Untagged resources carry `None`.
    #[serde(default)]
    pub role: Option<Role>,
    pub state: ResourceState,
    pub cores: u32,
    pub memory_mb: u64,
    #[serde(default)]
    pub address: Option<String>,
}

impl ResourceInfo {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == ResourceState::Running
    }
}

/// Non-disruptive change to an existing resource.
///
/// Only ever raises cores or memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
}

impl ResourcePatch {
    /// Compute the upward-only patch bringing `current` up to `spec`.
    #[must_use]
    pub fn upward(spec: &NodeSpec, current: &ResourceInfo) -> Self {
        Self {
            cores: (spec.resources.cores > current.cores).then_some(spec.resources.cores),
            memory_mb: (spec.resources.memory_mb > current.memory_mb)
                .then_some(spec.resources.memory_mb),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cores.is_none() && self.memory_mb.is_none()
    }
}

impl fmt::Display for ResourcePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(cores) = self.cores {
            parts.push(format!("cores={cores}"));
        }
        if let Some(memory) = self.memory_mb {
            parts.push(format!("memory_mb={memory}"));
        }
        if parts.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&parts.join(","))
        }
    }
}

/// True when the spec asks for less than the resource has.
///
/// Shrinking is disruptive and is never applied.
#[must_use]
pub fn requests_downsize(spec: &NodeSpec, current: &ResourceInfo) -> bool {
    spec.resources.cores < current.cores || spec.resources.memory_mb < current.memory_mb
}
