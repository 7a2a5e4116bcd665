//! Node specifications and the records kept for provisioned nodes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ResourceId;

/// Role a node plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Participates in cluster consensus and coordination.
    ControlPlane,
    /// Runs workloads; joins an existing control plane.
    Worker,
}

impl Role {
    /// Stable string form, matching the serialized representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ControlPlane => "control-plane",
            Self::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute resources requested for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub cores: u32,
    pub memory_mb: u64,
    pub disk_gb: u64,
    /// Fixed network address. Resolved by name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Immutable description of one desired node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub role: Role,
    #[serde(flatten)]
    pub resources: ResourceRequest,
}

impl NodeSpec {
    /// Create a spec with the given name, role and resources.
    pub fn new(name: impl Into<String>, role: Role, resources: ResourceRequest) -> Self {
        Self {
            name: name.into(),
            role,
            resources,
        }
    }

    #[must_use]
    pub fn is_control_plane(&self) -> bool {
        self.role == Role::ControlPlane
    }
}

/// Last status observed for a node, by the provisioner or the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Provisioning,
    Running,
    Stopped,
    Healthy,
    Degraded,
    Unreachable,
    Failed,
}

impl NodeStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unreachable => "unreachable",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted record of a provisioned node.
///
/// Created by the provisioner, updated by the health monitor, removed only by
/// explicit teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: ResourceId,
    pub role: Role,
    pub address: String,
    pub last_status: NodeStatus,
    pub last_checked_at: DateTime<Utc>,
    /// Cores the platform last reported for the resource.
    #[serde(default)]
    pub cores: u32,
    /// Memory the platform last reported for the resource.
    #[serde(default)]
    pub memory_mb: u64,
}

impl NodeRecord {
    /// Record an observation, stamping the check time.
    pub fn observe(&mut self, status: NodeStatus, at: DateTime<Utc>) {
        self.last_status = status;
        self.last_checked_at = at;
    }
}
