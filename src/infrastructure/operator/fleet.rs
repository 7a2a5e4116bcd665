//! Fleet operator implementation.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;

use crate::application::orchestration::orchestrator::Orchestrator;
use crate::application::orchestration::report::{DeployReport, DestroyReport, Plan, StatusReport};
use crate::application::progress::ProgressReporter;
use crate::domain::DeploymentState;
use crate::error::Result;
use crate::infrastructure::bootstrap::build_orchestrator;
use crate::infrastructure::config::logging::LoggingConfig;
use crate::infrastructure::config::settings::Config;
use crate::port::inbound::operator::{FleetOperator, FleetSummary, Overrides};

use super::entry::Operator;

/// Only the `[logging]` table, so logging works even when the rest is invalid.
#[derive(Deserialize, Default)]
struct LoggingOnly {
    #[serde(default)]
    logging: LoggingConfig,
}

fn orchestrator(config_toml: &str, overrides: Overrides) -> Result<Orchestrator> {
    let config = Config::parse_toml(config_toml)?;
    build_orchestrator(&config, overrides)
}

#[async_trait]
impl FleetOperator for Operator {
    fn init_logging(&self, config_toml: Option<&str>, verbose: u8, quiet: bool) {
        let logging = config_toml
            .and_then(|content| toml::from_str::<LoggingOnly>(content).ok())
            .unwrap_or_default()
            .logging;
        logging.init(verbose, quiet);
    }

    fn summary(&self, config_toml: &str, overrides: Overrides) -> Result<FleetSummary> {
        let config = Config::parse_toml(config_toml)?;
        let settings = config.orchestrator_settings(overrides)?;
        let fleet = config.fleet()?;
        Ok(FleetSummary {
            cluster: fleet.cluster().to_string(),
            nodes: fleet.nodes().len(),
            control_planes: fleet.control_planes().count(),
            workers: fleet.workers().count(),
            max_parallelism: settings.max_parallelism,
            platform: config.platform.base_url,
        })
    }

    async fn plan(&self, config_toml: &str, overrides: Overrides) -> Result<Plan> {
        orchestrator(config_toml, overrides)?.plan().await
    }

    async fn deploy(
        &self,
        config_toml: &str,
        overrides: Overrides,
        progress: ProgressReporter,
        cancel: watch::Receiver<bool>,
    ) -> Result<DeployReport> {
        // Built inside the call so the reporter drops with the orchestrator.
        let orchestrator = orchestrator(config_toml, overrides)?
            .with_cancellation(cancel)
            .with_progress(progress);
        orchestrator.deploy().await
    }

    fn recorded(&self, config_toml: &str) -> Result<DeploymentState> {
        orchestrator(config_toml, Overrides::default())?.recorded()
    }

    async fn status(&self, config_toml: &str) -> Result<StatusReport> {
        orchestrator(config_toml, Overrides::default())?.status().await
    }

    async fn destroy(&self, config_toml: &str) -> Result<DestroyReport> {
        orchestrator(config_toml, Overrides::default())?.destroy().await
    }
}
