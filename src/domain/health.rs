//! Node and cluster health classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::node::{NodeStatus, Role};

/// Health of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeHealth {
    Healthy,
    /// Reachable, but the service is not ready.
    Degraded,
    Unreachable,
}

impl NodeHealth {
    #[must_use]
    pub const fn status(&self) -> NodeStatus {
        match self {
            Self::Healthy => NodeStatus::Healthy,
            Self::Degraded => NodeStatus::Degraded,
            Self::Unreachable => NodeStatus::Unreachable,
        }
    }
}

impl fmt::Display for NodeHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status().as_str())
    }
}

/// Aggregate cluster health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterHealth {
    Healthy,
    /// Control plane healthy, worker quorum not met.
    Degraded,
    /// At least one control-plane node is not healthy.
    Unhealthy,
}

impl fmt::Display for ClusterHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeHealthCheck {
    name: String,
    role: Role,
    health: NodeHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl NodeHealthCheck {
    pub fn new(name: impl Into<String>, role: Role, health: NodeHealth) -> Self {
        Self {
            name: name.into(),
            role,
            health,
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn health(&self) -> NodeHealth {
        self.health
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.health, NodeHealth::Healthy)
    }
}

/// One poll across the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    checks: Vec<NodeHealthCheck>,
}

impl HealthReport {
    #[must_use]
    pub fn new(checks: Vec<NodeHealthCheck>) -> Self {
        Self { checks }
    }

    pub fn checks(&self) -> &[NodeHealthCheck] {
        &self.checks
    }

    pub fn check(&self, name: &str) -> Option<&NodeHealthCheck> {
        self.checks.iter().find(|check| check.name() == name)
    }

    /// Share of healthy nodes, in `[0, 1]`.
    #[must_use]
    pub fn healthy_fraction(&self) -> f64 {
        if self.checks.is_empty() {
            return 1.0;
        }
        let healthy = self.checks.iter().filter(|check| check.is_healthy()).count();
        healthy as f64 / self.checks.len() as f64
    }

    /// Aggregate health under the given worker quorum (fraction in `(0, 1]`).
    #[must_use]
    pub fn aggregate(&self, worker_quorum: f64) -> ClusterHealth {
        let control_plane_healthy = self
            .checks
            .iter()
            .filter(|check| check.role() == Role::ControlPlane)
            .all(NodeHealthCheck::is_healthy);
        if !control_plane_healthy {
            return ClusterHealth::Unhealthy;
        }

        let workers: Vec<_> = self
            .checks
            .iter()
            .filter(|check| check.role() == Role::Worker)
            .collect();
        if workers.is_empty() {
            return ClusterHealth::Healthy;
        }

        let healthy = workers.iter().filter(|check| check.is_healthy()).count();
        // Compare counts rather than fractions so 100% means every worker.
        let required = (worker_quorum * workers.len() as f64 - 1e-9).ceil().max(0.0) as usize;
        if healthy >= required {
            ClusterHealth::Healthy
        } else {
            ClusterHealth::Degraded
        }
    }
}
