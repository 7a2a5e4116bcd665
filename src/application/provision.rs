//! Resource provisioning.
//!
//! Turns a [`NodeSpec`] into a running resource and its [`NodeRecord`]:
//! probe, reconcile, then create, adopt, resize or start as decided, and wait
//! for the platform to report the resource running.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use super::executor::JobHandle;
use super::retry::with_transient_retry;
use crate::domain::resource::requests_downsize;
use crate::domain::{
    reconcile, Action, LiveProbe, NodeRecord, NodeSpec, NodeStatus, ResourceId, ResourceInfo,
    RetryPolicy,
};
use crate::error::{ConfigError, Error, InfraError, Result};
use crate::port::outbound::platform::ComputePlatform;
use crate::port::outbound::resolver::NameResolver;

/// Tracing target for platform mutations.
pub const AUDIT_TARGET: &str = "fleetform::audit";

/// Record one platform mutation with its before and after state.
pub(crate) fn audit(node: &str, operation: &str, before: impl Display, after: impl Display) {
    info!(
        target: AUDIT_TARGET,
        node,
        operation,
        before = %before,
        after = %after,
        "Platform mutation"
    );
}

/// Timing bounds for provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionSettings {
    /// Spacing between status polls while waiting for a resource to run.
    pub poll_interval: Duration,
    /// Upper bound on waiting for a resource to run.
    pub boot_timeout: Duration,
    /// Upper bound on a single live probe.
    pub probe_timeout: Duration,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            boot_timeout: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

/// How a node came to be running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    Adopted,
}

impl ProvisionOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Adopted => "adopted",
        }
    }
}

/// Result of one create-or-adopt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub record: NodeRecord,
    pub outcome: ProvisionOutcome,
    pub action: Action,
}

/// Drives the compute platform for one node at a time.
#[derive(Clone)]
pub struct Provisioner {
    platform: Arc<dyn ComputePlatform>,
    resolver: Arc<dyn NameResolver>,
    retry: RetryPolicy,
    settings: ProvisionSettings,
}

impl Provisioner {
    pub fn new(
        platform: Arc<dyn ComputePlatform>,
        resolver: Arc<dyn NameResolver>,
        retry: RetryPolicy,
        settings: ProvisionSettings,
    ) -> Self {
        Self {
            platform,
            resolver,
            retry,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ProvisionSettings {
        &self.settings
    }

    /// Live-probe the resource behind `record`.
    ///
    /// Never fails: an unknown identifier is [`LiveProbe::Absent`], anything
    /// else that keeps the platform from answering is [`LiveProbe::TimedOut`].
    pub async fn probe(&self, name: &str, record: Option<&NodeRecord>) -> LiveProbe {
        let Some(record) = record else {
            return LiveProbe::NotProbed;
        };

        match timeout(self.settings.probe_timeout, self.platform.status(&record.id)).await {
            Ok(Ok(info)) => LiveProbe::Found(info),
            Ok(Err(Error::Infra(InfraError::NotFound { .. }))) => {
                debug!(node = name, id = %record.id, "Recorded resource is gone");
                LiveProbe::Absent
            }
            Ok(Err(err)) => {
                warn!(node = name, id = %record.id, error = %err, "Live probe failed");
                LiveProbe::TimedOut
            }
            Err(_) => {
                warn!(
                    node = name,
                    id = %record.id,
                    timeout_secs = self.settings.probe_timeout.as_secs(),
                    "Live probe timed out"
                );
                LiveProbe::TimedOut
            }
        }
    }

    /// Probe and reconcile without mutating anything.
    pub async fn plan(&self, spec: &NodeSpec, record: Option<&NodeRecord>) -> Result<Action> {
        let probe = self.probe(&spec.name, record).await;
        Ok(reconcile(spec, record, &probe)?)
    }

    /// Bring `spec` to a running resource, creating it only when needed.
    pub async fn create_or_adopt(
        &self,
        spec: &NodeSpec,
        existing: Option<&NodeRecord>,
        handle: Option<&JobHandle>,
    ) -> Result<Provisioned> {
        let probe = self.probe(&spec.name, existing).await;
        let action = reconcile(spec, existing, &probe)?;

        if let LiveProbe::Found(info) = &probe {
            if requests_downsize(spec, info) {
                warn!(
                    node = %spec.name,
                    requested_cores = spec.resources.cores,
                    actual_cores = info.cores,
                    requested_memory_mb = spec.resources.memory_mb,
                    actual_memory_mb = info.memory_mb,
                    "Node has more resources than requested; not shrinking"
                );
            }
        }
        debug!(node = %spec.name, action = %action, "Reconciled");

        let (info, outcome) = match (&action, probe) {
            (Action::Create, _) => self.create(spec, handle).await?,
            (Action::Adopt, LiveProbe::Found(info)) => {
                info!(node = %spec.name, id = %info.id, "Adopting running resource");
                (info, ProvisionOutcome::Adopted)
            }
            (Action::Update(patch), LiveProbe::Found(info)) => {
                with_transient_retry(&self.retry, "platform.resize", handle, |_| {
                    self.platform.resize(&info.id, patch)
                })
                .await?;
                audit(
                    &spec.name,
                    "resize",
                    format_args!("cores={},memory_mb={}", info.cores, info.memory_mb),
                    patch,
                );
                let info = self.wait_running(spec, &info.id).await?;
                (info, ProvisionOutcome::Adopted)
            }
            (Action::Skip, LiveProbe::Found(info)) => {
                self.start(spec, &info, handle).await?;
                let info = self.wait_running(spec, &info.id).await?;
                (info, ProvisionOutcome::Adopted)
            }
            (_, _) => {
                return Err(Error::Infra(InfraError::NotFound {
                    id: spec.name.clone(),
                }))
            }
        };

        let address = self.address_for(spec, &info).await?;
        let record = NodeRecord {
            id: info.id,
            role: spec.role,
            address,
            last_status: NodeStatus::Running,
            last_checked_at: Utc::now(),
            cores: info.cores,
            memory_mb: info.memory_mb,
        };

        Ok(Provisioned {
            record,
            outcome,
            action,
        })
    }

    async fn create(
        &self,
        spec: &NodeSpec,
        handle: Option<&JobHandle>,
    ) -> Result<(ResourceInfo, ProvisionOutcome)> {
        let created = with_transient_retry(&self.retry, "platform.create", handle, |_| {
            self.platform.create(spec)
        })
        .await;

        let (info, outcome) = match created {
            Ok(id) => {
                audit(&spec.name, "create", "absent", &id);
                let info = self.status(&id, handle).await?;
                (info, ProvisionOutcome::Created)
            }
            Err(Error::Infra(InfraError::ResourceConflict { id })) => {
                let id = ResourceId::new(id);
                let info = self.status(&id, handle).await?;
                verify_identity(spec, &info)?;
                info!(node = %spec.name, id = %id, "Resource already exists, adopting");
                (info, ProvisionOutcome::Adopted)
            }
            Err(err) => return Err(err),
        };

        self.start(spec, &info, handle).await?;
        let info = self.wait_running(spec, &info.id).await?;
        Ok((info, outcome))
    }

    async fn status(&self, id: &ResourceId, handle: Option<&JobHandle>) -> Result<ResourceInfo> {
        with_transient_retry(&self.retry, "platform.status", handle, |_| {
            self.platform.status(id)
        })
        .await
    }

    async fn start(
        &self,
        spec: &NodeSpec,
        info: &ResourceInfo,
        handle: Option<&JobHandle>,
    ) -> Result<()> {
        if info.is_running() {
            return Ok(());
        }
        with_transient_retry(&self.retry, "platform.start", handle, |_| {
            self.platform.start(&info.id)
        })
        .await?;
        audit(&spec.name, "start", info.state, "starting");
        Ok(())
    }

    /// Poll until the resource runs or the boot timeout passes.
    ///
    /// The last sleep is clipped to the remaining budget, so a resource that
    /// never runs fails at the bound, not up to a poll interval later.
    pub async fn wait_running(&self, spec: &NodeSpec, id: &ResourceId) -> Result<ResourceInfo> {
        let bound = self.settings.boot_timeout;
        let started = Instant::now();

        loop {
            match self.platform.status(id).await {
                Ok(info) if info.is_running() => {
                    debug!(
                        node = %spec.name,
                        id = %id,
                        waited_secs = started.elapsed().as_secs(),
                        "Resource running"
                    );
                    return Ok(info);
                }
                Ok(info) => {
                    debug!(node = %spec.name, id = %id, state = %info.state, "Waiting for resource");
                }
                Err(err) if err.is_transient() => {
                    debug!(node = %spec.name, id = %id, error = %err, "Status poll failed");
                }
                Err(err) => return Err(err),
            }

            let elapsed = started.elapsed();
            if elapsed >= bound {
                return Err(Error::timeout(
                    format!("{} ({id}) to report running", spec.name),
                    elapsed,
                ));
            }
            sleep(self.settings.poll_interval.min(bound - elapsed)).await;
        }
    }

    async fn address_for(&self, spec: &NodeSpec, info: &ResourceInfo) -> Result<String> {
        if let Some(address) = &spec.resources.address {
            return Ok(address.clone());
        }
        if let Some(address) = &info.address {
            return Ok(address.clone());
        }
        with_transient_retry(&self.retry, "resolver.resolve", None, |_| {
            self.resolver.resolve(&spec.name)
        })
        .await
    }

    /// Delete the resource behind `record`. An absent resource counts as deleted.
    pub async fn teardown(&self, name: &str, record: &NodeRecord) -> Result<()> {
        let deleted = with_transient_retry(&self.retry, "platform.delete", None, |_| {
            self.platform.delete(&record.id)
        })
        .await;

        match deleted {
            Ok(()) | Err(Error::Infra(InfraError::NotFound { .. })) => {
                audit(name, "delete", &record.id, "absent");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

fn verify_identity(spec: &NodeSpec, info: &ResourceInfo) -> Result<()> {
    let role_differs = info.role.is_some_and(|role| role != spec.role);
    if info.name != spec.name || role_differs {
        return Err(ConfigError::ResourceMismatch {
            id: info.id.to_string(),
            expected_name: spec.name.clone(),
            expected_role: spec.role.to_string(),
            actual_name: info.name.clone(),
            actual_role: info
                .role
                .map_or_else(|| "untagged".to_string(), |role| role.to_string()),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ResourcePatch, ResourceState, Role};
    use crate::testkit::config::{fast_retry, node_spec};
    use crate::testkit::platform::FakePlatform;
    use crate::testkit::resolver::StaticResolver;

    fn provisioner(platform: &Arc<FakePlatform>) -> Provisioner {
        Provisioner::new(
            platform.clone(),
            Arc::new(StaticResolver::new()),
            fast_retry(),
            ProvisionSettings::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn creates_absent_node_and_waits_for_running() {
        let platform = Arc::new(FakePlatform::new().with_boot_polls(2));
        let spec = node_spec("cp-1", Role::ControlPlane);

        let provisioned = provisioner(&platform)
            .create_or_adopt(&spec, None, None)
            .await
            .unwrap();

        assert_eq!(provisioned.outcome, ProvisionOutcome::Created);
        assert_eq!(provisioned.action, Action::Create);
        assert_eq!(provisioned.record.role, Role::ControlPlane);
        assert_eq!(provisioned.record.last_status, NodeStatus::Running);
        assert!(!provisioned.record.address.is_empty());
        assert_eq!(platform.calls().create, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn adopts_running_node_without_mutating() {
        let platform = Arc::new(FakePlatform::new());
        let spec = node_spec("w-1", Role::Worker);
        let p = provisioner(&platform);
        let first = p.create_or_adopt(&spec, None, None).await.unwrap();
        let mutating = platform.calls().mutating();

        let second = p
            .create_or_adopt(&spec, Some(&first.record), None)
            .await
            .unwrap();

        assert_eq!(second.outcome, ProvisionOutcome::Adopted);
        assert_eq!(second.action, Action::Adopt);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(platform.calls().mutating(), mutating);
    }

    #[tokio::test(start_paused = true)]
    async fn conflict_on_create_adopts_existing_resource() {
        let platform = Arc::new(FakePlatform::new());
        let spec = node_spec("w-1", Role::Worker);
        let p = provisioner(&platform);
        let first = p.create_or_adopt(&spec, None, None).await.unwrap();

        // No record, as when the probe timed out or the state was lost.
        let again = p.create_or_adopt(&spec, None, None).await.unwrap();

        assert_eq!(again.outcome, ProvisionOutcome::Adopted);
        assert_eq!(again.record.id, first.record.id);
        assert_eq!(platform.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn raises_resources_but_never_shrinks() {
        let platform = Arc::new(FakePlatform::new());
        let mut spec = node_spec("w-1", Role::Worker);
        let p = provisioner(&platform);
        let first = p.create_or_adopt(&spec, None, None).await.unwrap();

        spec.resources.memory_mb *= 2;
        spec.resources.cores = 1;
        let updated = p
            .create_or_adopt(&spec, Some(&first.record), None)
            .await
            .unwrap();

        assert_eq!(
            updated.action,
            Action::Update(ResourcePatch {
                cores: None,
                memory_mb: Some(spec.resources.memory_mb),
            })
        );
        assert_eq!(updated.record.memory_mb, spec.resources.memory_mb);
        assert_eq!(updated.record.cores, first.record.cores);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_node_is_started_not_recreated() {
        let platform = Arc::new(FakePlatform::new());
        let spec = node_spec("w-1", Role::Worker);
        let p = provisioner(&platform);
        let first = p.create_or_adopt(&spec, None, None).await.unwrap();
        platform.set_state(&first.record.id, ResourceState::Stopped);

        let again = p
            .create_or_adopt(&spec, Some(&first.record), None)
            .await
            .unwrap();

        assert_eq!(again.action, Action::Skip);
        assert_eq!(platform.calls().create, 1);
        assert_eq!(platform.calls().start, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn name_mismatch_is_configuration_error() {
        let platform = Arc::new(FakePlatform::new());
        let p = provisioner(&platform);
        let first = p
            .create_or_adopt(&node_spec("w-1", Role::Worker), None, None)
            .await
            .unwrap();

        let err = p
            .create_or_adopt(&node_spec("w-2", Role::Worker), Some(&first.record), None)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn never_running_node_times_out_at_the_bound() {
        let platform = Arc::new(FakePlatform::new());
        platform.never_running("w-1");
        let settings = ProvisionSettings {
            poll_interval: Duration::from_secs(7),
            boot_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(10),
        };
        let p = Provisioner::new(
            platform.clone(),
            Arc::new(StaticResolver::new()),
            fast_retry(),
            settings,
        );

        let started = Instant::now();
        let err = p
            .create_or_adopt(&node_spec("w-1", Role::Worker), None, None)
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, Error::Infra(InfraError::Timeout { .. })));
        assert!(elapsed >= settings.boot_timeout);
        assert!(elapsed < settings.boot_timeout + settings.poll_interval);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_treats_absent_as_deleted() {
        let platform = Arc::new(FakePlatform::new());
        let p = provisioner(&platform);
        let first = p
            .create_or_adopt(&node_spec("w-1", Role::Worker), None, None)
            .await
            .unwrap();

        p.teardown("w-1", &first.record).await.unwrap();
        p.teardown("w-1", &first.record).await.unwrap();

        assert_eq!(platform.len(), 0);
    }
}
