//! Run reports returned to the CLI.

use serde::Serialize;

use crate::application::cluster::coordinator::BootstrapOutcome;
use crate::application::provision::ProvisionOutcome;
use crate::domain::{
    Action, ClusterHealth, DeploymentPhase, DeploymentState, FleetSpec, HealthReport, NodeStatus,
    Phase, Role,
};
use crate::error::Error;

/// Exit code for full success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for partial failure or an unhealthy fleet.
pub const EXIT_PARTIAL: i32 = 1;
/// Exit code for a fatal configuration error.
pub const EXIT_FATAL: i32 = 2;

/// Final outcome of one node in a deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeOutcome {
    Created,
    Adopted,
    Failed,
}

impl From<ProvisionOutcome> for NodeOutcome {
    fn from(outcome: ProvisionOutcome) -> Self {
        match outcome {
            ProvisionOutcome::Created => Self::Created,
            ProvisionOutcome::Adopted => Self::Adopted,
        }
    }
}

impl std::fmt::Display for NodeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Adopted => "adopted",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub name: String,
    pub role: Role,
    pub outcome: NodeOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    /// Phase the node failed in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_in: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeReport {
    pub fn new(name: impl Into<String>, role: Role, outcome: NodeOutcome) -> Self {
        Self {
            name: name.into(),
            role,
            outcome,
            status: None,
            failed_in: None,
            error: None,
        }
    }

    /// Node that failed in `phase` before reaching any other outcome.
    pub fn failed(name: impl Into<String>, role: Role, phase: Phase, error: &Error) -> Self {
        Self {
            failed_in: Some(phase),
            error: Some(error.to_string()),
            ..Self::new(name, role, NodeOutcome::Failed)
        }
    }

    /// Mark the node failed. The first failure wins.
    pub fn fail(&mut self, phase: Phase, error: &Error) {
        if self.outcome == NodeOutcome::Failed {
            return;
        }
        self.outcome = NodeOutcome::Failed;
        self.failed_in = Some(phase);
        self.error = Some(error.to_string());
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.outcome == NodeOutcome::Failed
    }
}

/// Everything a deploy did, node by node, plus overall health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployReport {
    pub cluster: String,
    pub phase: DeploymentPhase,
    pub nodes: Vec<NodeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<ClusterHealth>,
    pub cancelled: bool,
}

impl DeployReport {
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut NodeReport> {
        self.nodes.iter_mut().find(|node| node.name == name)
    }

    pub fn failed(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes.iter().filter(|node| node.is_failed())
    }

    #[must_use]
    pub fn count(&self, outcome: NodeOutcome) -> usize {
        self.nodes.iter().filter(|node| node.outcome == outcome).count()
    }

    /// `0` only when every node succeeded and the fleet is healthy.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        let healthy = self.health == Some(ClusterHealth::Healthy);
        if healthy && !self.cancelled && self.failed().next().is_none() {
            EXIT_SUCCESS
        } else {
            EXIT_PARTIAL
        }
    }
}

/// Planned action for one node, from a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub name: String,
    pub role: Role,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
    /// Recorded nodes no longer in the fleet. Deploy leaves them alone.
    pub orphans: Vec<String>,
}

impl Plan {
    pub(crate) fn orphans_of(fleet: &FleetSpec, state: &DeploymentState) -> Vec<String> {
        state
            .nodes
            .keys()
            .filter(|name| fleet.get(name).is_none())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn action_for(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.action.as_str())
    }

    pub(crate) fn entry(name: &str, role: Role, action: &Action, id: Option<String>) -> PlanEntry {
        PlanEntry {
            name: name.to_string(),
            role,
            action: action.to_string(),
            id,
        }
    }
}

/// One side-effect-free look at the fleet.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// State with this poll's observations applied. Never persisted.
    pub state: DeploymentState,
    pub checks: Option<HealthReport>,
    pub health: Option<ClusterHealth>,
}

impl StatusReport {
    #[must_use]
    pub fn has_state(&self) -> bool {
        !self.state.is_empty()
    }

    /// `0` when healthy or when nothing is deployed, `1` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.health {
            None | Some(ClusterHealth::Healthy) => EXIT_SUCCESS,
            Some(_) => EXIT_PARTIAL,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DestroyReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub token_removed: bool,
}

impl DestroyReport {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() {
            EXIT_SUCCESS
        } else {
            EXIT_PARTIAL
        }
    }
}
