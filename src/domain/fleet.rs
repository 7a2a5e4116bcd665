//! Validated fleet description.

use std::collections::HashSet;

use super::node::{NodeSpec, Role};
use crate::error::ConfigError;

/// A name-unique set of node specs with at least one control-plane node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetSpec {
    cluster: String,
    nodes: Vec<NodeSpec>,
}

impl FleetSpec {
    /// Validate and build a fleet.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] on an empty fleet, duplicate names, zero
    /// cores or memory, or a fleet without a control-plane node.
    pub fn new(cluster: impl Into<String>, nodes: Vec<NodeSpec>) -> Result<Self, ConfigError> {
        let cluster = cluster.into();
        if cluster.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "cluster.name",
            });
        }
        if nodes.is_empty() {
            return Err(ConfigError::MissingField { field: "nodes" });
        }

        let mut seen = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if node.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "nodes.name",
                    reason: "node name must not be empty".into(),
                });
            }
            if !seen.insert(node.name.as_str()) {
                return Err(ConfigError::DuplicateNode {
                    name: node.name.clone(),
                });
            }
            if node.resources.cores == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "nodes.cores",
                    reason: format!("node '{}' requests zero cores", node.name),
                });
            }
            if node.resources.memory_mb == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "nodes.memory_mb",
                    reason: format!("node '{}' requests zero memory", node.name),
                });
            }
        }

        if !nodes.iter().any(NodeSpec::is_control_plane) {
            return Err(ConfigError::InvalidValue {
                field: "nodes.role",
                reason: "fleet needs at least one control-plane node".into(),
            });
        }

        Ok(Self { cluster, nodes })
    }

    #[must_use]
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    #[must_use]
    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// The control-plane node that bootstraps the cluster: first in fleet order.
    #[must_use]
    pub fn primary_control_plane(&self) -> &NodeSpec {
        self.nodes
            .iter()
            .find(|node| node.role == Role::ControlPlane)
            .unwrap_or(&self.nodes[0])
    }

    pub fn control_planes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|node| node.role == Role::ControlPlane)
    }

    pub fn workers(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|node| node.role == Role::Worker)
    }
}
