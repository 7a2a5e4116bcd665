//! In-memory compute platform.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{NodeSpec, ResourceId, ResourceInfo, ResourcePatch, ResourceState};
use crate::error::{Error, InfraError, Result};
use crate::port::outbound::platform::ComputePlatform;

/// Call counts per platform operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformCalls {
    pub create: usize,
    pub start: usize,
    pub status: usize,
    pub resize: usize,
    pub delete: usize,
}

impl PlatformCalls {
    /// Calls that change the platform's resource set.
    #[must_use]
    pub fn mutating(&self) -> usize {
        self.create + self.start + self.resize + self.delete
    }
}

#[derive(Default)]
struct Inner {
    resources: BTreeMap<ResourceId, ResourceInfo>,
    /// Status polls left before a starting resource reports running.
    booting: BTreeMap<ResourceId, u32>,
    next_id: u32,
    calls: PlatformCalls,
    boot_polls: u32,
    never_running: HashSet<String>,
    failing_creates: u32,
    unresponsive: bool,
}

/// Fake platform with scriptable boot behavior.
///
/// Created resources start stopped. `start` moves them to provisioning, and
/// they report running after `boot_polls` status calls.
#[derive(Default)]
pub struct FakePlatform {
    inner: Mutex<Inner>,
}

impl FakePlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_boot_polls(self, polls: u32) -> Self {
        self.inner.lock().boot_polls = polls;
        self
    }

    /// Resources named `name` never reach running.
    pub fn never_running(&self, name: &str) {
        self.inner.lock().never_running.insert(name.to_string());
    }

    /// Fail the next `count` creates with a transient error.
    pub fn fail_creates(&self, count: u32) {
        self.inner.lock().failing_creates = count;
    }

    /// Make every status call fail transiently.
    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.inner.lock().unresponsive = unresponsive;
    }

    pub fn set_state(&self, id: &ResourceId, state: ResourceState) {
        if let Some(info) = self.inner.lock().resources.get_mut(id) {
            info.state = state;
        }
    }

    /// Place a resource directly, as if created out of band.
    pub fn insert(&self, info: ResourceInfo) {
        self.inner.lock().resources.insert(info.id.clone(), info);
    }

    pub fn remove(&self, id: &ResourceId) {
        self.inner.lock().resources.remove(id);
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<ResourceInfo> {
        self.inner
            .lock()
            .resources
            .values()
            .find(|info| info.name == name)
            .cloned()
    }

    #[must_use]
    pub fn calls(&self) -> PlatformCalls {
        self.inner.lock().calls
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn not_found(id: &ResourceId) -> Error {
    Error::Infra(InfraError::NotFound { id: id.to_string() })
}

#[async_trait]
impl ComputePlatform for FakePlatform {
    async fn create(&self, spec: &NodeSpec) -> Result<ResourceId> {
        let mut inner = self.inner.lock();
        inner.calls.create += 1;

        if inner.failing_creates > 0 {
            inner.failing_creates -= 1;
            return Err(Error::transient("platform busy"));
        }
        if let Some(existing) = inner.resources.values().find(|info| info.name == spec.name) {
            return Err(Error::Infra(InfraError::ResourceConflict {
                id: existing.id.to_string(),
            }));
        }

        let n = inner.next_id;
        inner.next_id += 1;
        let id = ResourceId::new(format!("vm-{}", 100 + n));
        inner.resources.insert(
            id.clone(),
            ResourceInfo {
                id: id.clone(),
                name: spec.name.clone(),
                role: Some(spec.role),
                state: ResourceState::Stopped,
                cores: spec.resources.cores,
                memory_mb: spec.resources.memory_mb,
                address: Some(format!("10.0.0.{}", 10 + n)),
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &ResourceId) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.calls.start += 1;
        let boot_polls = inner.boot_polls;

        let Some(info) = inner.resources.get_mut(id) else {
            return Err(not_found(id));
        };
        if info.state == ResourceState::Running {
            return Ok(());
        }
        let never = inner.never_running.contains(&info.name);
        if never || boot_polls > 0 {
            info.state = ResourceState::Provisioning;
            if !never {
                inner.booting.insert(id.clone(), boot_polls);
            }
        } else {
            info.state = ResourceState::Running;
        }
        Ok(())
    }

    async fn status(&self, id: &ResourceId) -> Result<ResourceInfo> {
        let mut inner = self.inner.lock();
        inner.calls.status += 1;
        if inner.unresponsive {
            return Err(Error::transient("platform API unreachable"));
        }

        let ready = match inner.booting.get_mut(id) {
            Some(left) if *left <= 1 => true,
            Some(left) => {
                *left -= 1;
                false
            }
            None => false,
        };
        if ready {
            inner.booting.remove(id);
            if let Some(info) = inner.resources.get_mut(id) {
                info.state = ResourceState::Running;
            }
        }

        inner.resources.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn resize(&self, id: &ResourceId, patch: &ResourcePatch) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.resize += 1;
        let info = inner.resources.get_mut(id).ok_or_else(|| not_found(id))?;
        if let Some(cores) = patch.cores {
            info.cores = cores;
        }
        if let Some(memory_mb) = patch.memory_mb {
            info.memory_mb = memory_mb;
        }
        Ok(())
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.delete += 1;
        inner.resources.remove(id);
        inner.booting.remove(id);
        Ok(())
    }
}
