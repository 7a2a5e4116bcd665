//! Orchestrator wired to in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

use crate::application::health::HealthSettings;
use crate::application::installer::Procedure;
use crate::application::orchestration::orchestrator::{
    Dependencies, Orchestrator, OrchestratorSettings,
};
use crate::application::provision::ProvisionSettings;
use crate::domain::FleetSpec;

use super::config::fast_retry;
use super::observer::ConcurrencyProbe;
use super::platform::FakePlatform;
use super::remote::FakeChannel;
use super::resolver::StaticResolver;
use super::runtime::FakeRuntime;
use super::store::{MemoryStore, MemoryTokenStore};

/// Fakes shared across runs, so repeated deploys see the same world.
pub struct Harness {
    pub platform: Arc<FakePlatform>,
    pub channel: Arc<FakeChannel>,
    pub runtime: Arc<FakeRuntime>,
    pub store: Arc<MemoryStore>,
    pub tokens: Arc<MemoryTokenStore>,
    pub probe: Arc<ConcurrencyProbe>,
    pub settings: OrchestratorSettings,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self {
            platform: Arc::new(FakePlatform::new()),
            channel: Arc::new(FakeChannel::new()),
            runtime: Arc::new(FakeRuntime::new()),
            store: Arc::new(MemoryStore::new()),
            tokens: Arc::new(MemoryTokenStore::new()),
            probe: Arc::new(ConcurrencyProbe::new()),
            settings: settings(),
        }
    }

    #[must_use]
    pub fn with_platform(mut self, platform: FakePlatform) -> Self {
        self.platform = Arc::new(platform);
        self
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime: FakeRuntime) -> Self {
        self.runtime = Arc::new(runtime);
        self
    }

    /// Fresh orchestrator over the shared fakes.
    #[must_use]
    pub fn orchestrator(&self, fleet: FleetSpec) -> Orchestrator {
        let deps = Dependencies {
            platform: self.platform.clone(),
            channel: self.channel.clone(),
            resolver: Arc::new(StaticResolver::new()),
            runtime: self.runtime.clone(),
            state: self.store.clone(),
            tokens: self.tokens.clone(),
        };
        Orchestrator::new(fleet, deps, self.settings.clone()).with_observer(self.probe.clone())
    }
}

/// Settings with the fast retry policy and short polls.
pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        max_parallelism: 4,
        idempotent: true,
        retry: fast_retry(),
        provision: ProvisionSettings {
            poll_interval: Duration::from_secs(5),
            boot_timeout: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(10),
        },
        health: HealthSettings {
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(120),
            check_timeout: Duration::from_secs(5),
            worker_quorum: 1.0,
        },
        api_port: 6443,
        install: Procedure::new("install", "fleet install"),
        command_timeout: Duration::from_secs(600),
    }
}
