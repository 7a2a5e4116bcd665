//! Persisted deployment state.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::node::NodeRecord;

/// Current state document schema version.
pub const STATE_VERSION: u32 = 1;

/// Overall progress marker of a deployment.
///
/// Ordered: a later variant means more of the deployment has completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentPhase {
    #[default]
    Empty,
    Provisioned,
    ControlPlaneReady,
    ClusterFormed,
    Installed,
    Verified,
}

impl fmt::Display for DeploymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Empty => "empty",
            Self::Provisioned => "provisioned",
            Self::ControlPlaneReady => "control-plane-ready",
            Self::ClusterFormed => "cluster-formed",
            Self::Installed => "installed",
            Self::Verified => "verified",
        };
        f.write_str(label)
    }
}

/// Mapping of node name to record, plus the phase marker.
///
/// Keyed by name, so two records for the same node cannot coexist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    pub version: u32,
    pub phase: DeploymentPhase,
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeRecord>,
    pub updated_at: DateTime<Utc>,
}

impl Default for DeploymentState {
    fn default() -> Self {
        Self::empty()
    }
}

impl DeploymentState {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: STATE_VERSION,
            phase: DeploymentPhase::Empty,
            nodes: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.phase == DeploymentPhase::Empty
    }

    #[must_use]
    pub fn record(&self, name: &str) -> Option<&NodeRecord> {
        self.nodes.get(name)
    }

    pub fn record_mut(&mut self, name: &str) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(name)
    }

    /// Insert or replace the record for `name`. Returns the previous record.
    pub fn upsert(&mut self, name: impl Into<String>, record: NodeRecord) -> Option<NodeRecord> {
        self.nodes.insert(name.into(), record)
    }

    pub fn remove(&mut self, name: &str) -> Option<NodeRecord> {
        self.nodes.remove(name)
    }

    /// Move the phase marker forward. Never moves it backward.
    pub fn advance(&mut self, phase: DeploymentPhase) {
        if phase > self.phase {
            self.phase = phase;
        }
    }

    /// Drop every record and reset the marker, for teardown.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.phase = DeploymentPhase::Empty;
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
