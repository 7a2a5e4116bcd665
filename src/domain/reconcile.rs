//! Idempotency checker: decides what to do with each desired node.
//!
//! [`reconcile`] is a pure function of the spec, the existing record and the
//! live probe result. Equal inputs always produce equal actions.

use std::fmt;

use super::node::{NodeRecord, NodeSpec};
use super::resource::{ResourceInfo, ResourcePatch, ResourceState};
use crate::error::ConfigError;

/// Result of live-probing a recorded resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveProbe {
    /// No record, so nothing was probed.
    NotProbed,
    Found(ResourceInfo),
    /// The platform no longer knows the recorded identifier.
    Absent,
    /// The probe did not answer in time.
    TimedOut,
}

/// Action to take for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create,
    Adopt,
    Update(ResourcePatch),
    /// Resource exists as specified; only ensure it is started.
    Skip,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Adopt => f.write_str("adopt"),
            Self::Update(patch) => write!(f, "update ({patch})"),
            Self::Skip => f.write_str("start"),
        }
    }
}

/// Decide the action for `spec` given its existing record and probe result.
///
/// # Errors
///
/// Returns [`ConfigError::ResourceMismatch`] when the recorded resource
/// exists under a different name or role than requested. Callers must abort
/// rather than overwrite it.
pub fn reconcile(
    spec: &NodeSpec,
    record: Option<&NodeRecord>,
    probe: &LiveProbe,
) -> Result<Action, ConfigError> {
    let Some(record) = record else {
        return Ok(Action::Create);
    };

    let info = match probe {
        // Platform-side "already exists" handling covers a resource that
        // survived an unanswered probe.
        LiveProbe::NotProbed | LiveProbe::TimedOut | LiveProbe::Absent => {
            return Ok(Action::Create);
        }
        LiveProbe::Found(info) => info,
    };

    let role_differs = record.role != spec.role || info.role.is_some_and(|role| role != spec.role);
    if info.name != spec.name || role_differs {
        return Err(ConfigError::ResourceMismatch {
            id: info.id.to_string(),
            expected_name: spec.name.clone(),
            expected_role: spec.role.to_string(),
            actual_name: info.name.clone(),
            actual_role: info.role.unwrap_or(record.role).to_string(),
        });
    }

    match info.state {
        ResourceState::Running => {
            let patch = ResourcePatch::upward(spec, info);
            if patch.is_empty() {
                Ok(Action::Adopt)
            } else {
                Ok(Action::Update(patch))
            }
        }
        ResourceState::Provisioning | ResourceState::Stopped | ResourceState::Failed => {
            Ok(Action::Skip)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::id::ResourceId;
    use crate::domain::node::{NodeStatus, ResourceRequest, Role};

    fn spec(role: Role) -> NodeSpec {
        NodeSpec::new(
            "cp-1",
            role,
            ResourceRequest {
                cores: 4,
                memory_mb: 8192,
                disk_gb: 40,
                address: None,
            },
        )
    }

    fn record(role: Role) -> NodeRecord {
        NodeRecord {
            id: ResourceId::new("101"),
            role,
            address: "10.0.0.10".into(),
            last_status: NodeStatus::Healthy,
            last_checked_at: Utc::now(),
            cores: 4,
            memory_mb: 8192,
        }
    }

    fn info(state: ResourceState, cores: u32, memory_mb: u64) -> ResourceInfo {
        ResourceInfo {
            id: ResourceId::new("101"),
            name: "cp-1".into(),
            role: Some(Role::ControlPlane),
            state,
            cores,
            memory_mb,
            address: Some("10.0.0.10".into()),
        }
    }

    #[test]
    fn no_record_means_create() {
        let action = reconcile(&spec(Role::ControlPlane), None, &LiveProbe::NotProbed).unwrap();
        assert_eq!(action, Action::Create);
    }

    #[test]
    fn healthy_matching_record_is_adopted_never_created() {
        let spec = spec(Role::ControlPlane);
        let record = record(Role::ControlPlane);
        let probe = LiveProbe::Found(info(ResourceState::Running, 4, 8192));

        for _ in 0..3 {
            let action = reconcile(&spec, Some(&record), &probe).unwrap();
            assert_eq!(action, Action::Adopt);
        }
    }

    #[test]
    fn timed_out_probe_falls_back_to_create() {
        let action = reconcile(
            &spec(Role::ControlPlane),
            Some(&record(Role::ControlPlane)),
            &LiveProbe::TimedOut,
        )
        .unwrap();
        assert_eq!(action, Action::Create);
    }

    #[test]
    fn vanished_resource_is_recreated() {
        let action = reconcile(
            &spec(Role::ControlPlane),
            Some(&record(Role::ControlPlane)),
            &LiveProbe::Absent,
        )
        .unwrap();
        assert_eq!(action, Action::Create);
    }

    #[test]
    fn upward_resize_yields_update() {
        let probe = LiveProbe::Found(info(ResourceState::Running, 2, 8192));
        let action = reconcile(
            &spec(Role::ControlPlane),
            Some(&record(Role::ControlPlane)),
            &probe,
        )
        .unwrap();

        assert_eq!(
            action,
            Action::Update(ResourcePatch {
                cores: Some(4),
                memory_mb: None,
            })
        );
    }

    #[test]
    fn downsize_is_never_a_patch() {
        let probe = LiveProbe::Found(info(ResourceState::Running, 8, 16384));
        let action = reconcile(
            &spec(Role::ControlPlane),
            Some(&record(Role::ControlPlane)),
            &probe,
        )
        .unwrap();
        assert_eq!(action, Action::Adopt);
    }

    #[test]
    fn stopped_resource_is_started_not_recreated() {
        let probe = LiveProbe::Found(info(ResourceState::Stopped, 4, 8192));
        let action = reconcile(
            &spec(Role::ControlPlane),
            Some(&record(Role::ControlPlane)),
            &probe,
        )
        .unwrap();
        assert_eq!(action, Action::Skip);
    }

    #[test]
    fn role_mismatch_fails_fast() {
        let probe = LiveProbe::Found(info(ResourceState::Running, 4, 8192));
        let err = reconcile(&spec(Role::Worker), Some(&record(Role::Worker)), &probe).unwrap_err();
        assert!(matches!(err, ConfigError::ResourceMismatch { .. }));
    }

    #[test]
    fn name_mismatch_fails_fast() {
        let mut other = info(ResourceState::Running, 4, 8192);
        other.name = "db-7".into();
        let err = reconcile(
            &spec(Role::ControlPlane),
            Some(&record(Role::ControlPlane)),
            &LiveProbe::Found(other),
        )
        .unwrap_err();

        match err {
            ConfigError::ResourceMismatch { actual_name, .. } => assert_eq!(actual_name, "db-7"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
