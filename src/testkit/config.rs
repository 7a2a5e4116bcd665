//! Canonical test configurations.
//!
//! Single source of truth for fixtures used across tests.
//! Avoids each test module defining its own slightly-different defaults.

use std::time::Duration;

use chrono::Utc;

use crate::application::cluster::procedure::ClusterProcedures;
use crate::application::installer::Procedure;
use crate::domain::{
    FleetSpec, NodeRecord, NodeSpec, NodeStatus, ResourceId, ResourceRequest, RetryPolicy, Role,
};

/// Three-attempt policy with short spacing.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(2),
        multiplier: 2.0,
    }
}

/// 2 cores, 4 GiB, 20 GB disk, no fixed address.
pub fn node_spec(name: &str, role: Role) -> NodeSpec {
    NodeSpec::new(
        name,
        role,
        ResourceRequest {
            cores: 2,
            memory_mb: 4096,
            disk_gb: 20,
            address: None,
        },
    )
}

/// Running record matching [`node_spec`].
pub fn node_record(id: &str, role: Role, address: &str) -> NodeRecord {
    NodeRecord {
        id: ResourceId::new(id),
        role,
        address: address.to_string(),
        last_status: NodeStatus::Running,
        last_checked_at: Utc::now(),
        cores: 2,
        memory_mb: 4096,
    }
}

/// One control-plane node and two workers.
pub fn three_node_fleet() -> FleetSpec {
    fleet(&[
        ("cp-1", Role::ControlPlane),
        ("w-1", Role::Worker),
        ("w-2", Role::Worker),
    ])
}

/// Fleet named `lab` from `(name, role)` pairs.
///
/// # Panics
///
/// Panics when the pairs do not form a valid fleet.
pub fn fleet(nodes: &[(&str, Role)]) -> FleetSpec {
    FleetSpec::new(
        "lab",
        nodes.iter().map(|(name, role)| node_spec(name, *role)).collect(),
    )
    .expect("fixture fleet is valid")
}

pub fn cluster_procedures() -> ClusterProcedures {
    ClusterProcedures {
        probe: Procedure::new("probe", "fleet members"),
        bootstrap: Procedure::new("bootstrap", "fleet bootstrap"),
        join: Procedure::new("join", "fleet join"),
        ready: Procedure::new("ready", "fleet ready"),
    }
}

/// Minimal valid configuration file.
pub const FLEET_TOML: &str = r#"
state_dir = ".fleetform"

[cluster]
name = "lab"

[platform]
base_url = "http://127.0.0.1:8006/api"

[ssh]
user = "ops"

[procedures.install]
command = "fleet install"

[procedures.probe]
command = "fleet members"

[procedures.bootstrap]
command = "fleet bootstrap"

[procedures.join]
command = "fleet join"

[procedures.ready]
command = "fleet ready"

[[nodes]]
name = "cp-1"
role = "control-plane"
cores = 2
memory_mb = 4096
disk_gb = 20

[[nodes]]
name = "w-1"
role = "worker"
cores = 2
memory_mb = 4096
disk_gb = 20

[[nodes]]
name = "w-2"
role = "worker"
cores = 2
memory_mb = 4096
disk_gb = 20
"#;
