//! Composition root: wires concrete adapters into the orchestrator.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::adapter::outbound::file_store::{FileStateStore, FileTokenStore};
use crate::adapter::outbound::platform::HttpPlatform;
use crate::adapter::outbound::resolver::DnsResolver;
use crate::adapter::outbound::ssh::SshChannel;
use crate::application::cluster::procedure::ProcedureClusterRuntime;
use crate::application::installer::Installer;
use crate::application::orchestration::orchestrator::{Dependencies, Orchestrator};
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::inbound::operator::Overrides;
use crate::port::outbound::remote::RemoteChannel;

/// Build the production adapter set from configuration.
pub fn build_dependencies(config: &Config) -> Dependencies {
    if config.platform.token.is_none() {
        warn!("FLEETFORM_PLATFORM_TOKEN not set; platform requests are unauthenticated");
    }

    let channel: Arc<dyn RemoteChannel> = Arc::new(SshChannel::new(config.ssh.clone()));
    let runtime = ProcedureClusterRuntime::new(
        Installer::new(Arc::clone(&channel), config.retry_policy())
            .with_command_timeout(config.command_timeout()),
        config.cluster_procedures(),
        config.cluster.name.clone(),
    );
    debug!(state_dir = %config.state_dir.display(), "Using state directory");

    Dependencies {
        platform: Arc::new(HttpPlatform::from_config(&config.platform)),
        channel,
        resolver: Arc::new(DnsResolver::new(config.resolver.hosts.clone())),
        runtime: Arc::new(runtime),
        state: Arc::new(FileStateStore::new(&config.state_dir)),
        tokens: Arc::new(FileTokenStore::new(&config.state_dir)),
    }
}

/// Orchestrator for `config` with CLI `overrides` applied.
pub fn build_orchestrator(config: &Config, overrides: Overrides) -> Result<Orchestrator> {
    let settings = config.orchestrator_settings(overrides)?;
    let fleet = config.fleet()?;
    Ok(Orchestrator::new(fleet, build_dependencies(config), settings))
}
