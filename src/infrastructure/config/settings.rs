//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates every setting. The
//! configuration is a TOML file. The platform API token is taken from the
//! `FLEETFORM_PLATFORM_TOKEN` environment variable, never from the file.
//!
//! # Example
//!
//! ```no_run
//! use fleetform::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("fleet.toml")?;
//!     let fleet = config.fleet()?;
//!     println!("{} nodes", fleet.nodes().len());
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::logging::LoggingConfig;
use crate::adapter::outbound::platform::PlatformConfig;
use crate::adapter::outbound::ssh::SshConfig;
use crate::application::cluster::coordinator::DEFAULT_API_PORT;
use crate::application::cluster::procedure::ClusterProcedures;
use crate::application::executor::DEFAULT_MAX_PARALLELISM;
use crate::application::health::HealthSettings;
use crate::application::installer::Procedure;
use crate::application::orchestration::orchestrator::OrchestratorSettings;
use crate::application::provision::ProvisionSettings;
use crate::domain::{FleetSpec, NodeSpec, ResourceRequest, RetryPolicy, Role};
use crate::error::{ConfigError, Result};
use crate::port::inbound::operator::Overrides;

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

const fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionConfig {
    #[serde(default = "default_provision_poll_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_boot_timeout_secs")]
    pub boot_timeout_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

const fn default_provision_poll_secs() -> u64 {
    5
}

const fn default_boot_timeout_secs() -> u64 {
    300
}

const fn default_probe_timeout_secs() -> u64 {
    10
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_provision_poll_secs(),
            boot_timeout_secs: default_boot_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,
}

const fn default_max_parallelism() -> usize {
    DEFAULT_MAX_PARALLELISM
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallelism: default_max_parallelism(),
        }
    }
}

/// Backoff for every remote operation.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_initial_delay_secs() -> u64 {
    10
}

const fn default_max_delay_secs() -> u64 {
    30
}

const fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_secs: default_initial_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            multiplier: default_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_poll_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_health_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_check_timeout_secs")]
    pub check_timeout_secs: u64,
    /// Share of workers that must be healthy, in `(0, 1]`.
    #[serde(default = "default_worker_quorum")]
    pub worker_quorum: f64,
}

const fn default_health_poll_secs() -> u64 {
    10
}

const fn default_health_timeout_secs() -> u64 {
    300
}

const fn default_check_timeout_secs() -> u64 {
    10
}

const fn default_worker_quorum() -> f64 {
    1.0
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_health_poll_secs(),
            timeout_secs: default_health_timeout_secs(),
            check_timeout_secs: default_check_timeout_secs(),
            worker_quorum: default_worker_quorum(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcedureConfig {
    pub command: String,
    /// Safe to re-run after a non-zero exit.
    #[serde(default)]
    pub retryable: bool,
}

impl ProcedureConfig {
    fn to_procedure(&self, name: &str) -> Procedure {
        let procedure = Procedure::new(name, self.command.clone());
        if self.retryable {
            procedure.retryable()
        } else {
            procedure
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProceduresConfig {
    pub install: ProcedureConfig,
    pub probe: ProcedureConfig,
    pub bootstrap: ProcedureConfig,
    pub join: ProcedureConfig,
    pub ready: ProcedureConfig,
}

impl ProceduresConfig {
    fn iter(&self) -> [(&'static str, &ProcedureConfig); 5] {
        [
            ("install", &self.install),
            ("probe", &self.probe),
            ("bootstrap", &self.bootstrap),
            ("join", &self.join),
            ("ready", &self.ready),
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolverConfig {
    /// Static name to address overrides.
    #[serde(default)]
    pub hosts: BTreeMap<String, String>,
}

/// One `[[nodes]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub role: Role,
    pub cores: u32,
    pub memory_mb: u64,
    pub disk_gb: u64,
    #[serde(default)]
    pub address: Option<String>,
}

impl From<&NodeConfig> for NodeSpec {
    fn from(node: &NodeConfig) -> Self {
        NodeSpec::new(
            node.name.clone(),
            node.role,
            ResourceRequest {
                cores: node.cores,
                memory_mb: node.memory_mb,
                disk_gb: node.disk_gb,
                address: node.address.clone(),
            },
        )
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory holding `state.json` and `token.json`.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    pub cluster: ClusterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    pub platform: PlatformConfig,

    pub ssh: SshConfig,

    #[serde(default)]
    pub provision: ProvisionConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub health: HealthConfig,

    pub procedures: ProceduresConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".fleetform")
}

fn positive(field: &'static str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must be greater than 0".to_string(),
        }
        .into());
    }
    Ok(())
}

impl Config {
    /// Parse and validate configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the content is malformed or fails
    /// validation.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::from)?;
        config.platform = config.platform.with_env_token();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::ReadFile(format!("{}: {err}", path.display())))?;
        Self::parse_toml(&content)
    }

    /// Check values are within acceptable ranges and the fleet is valid.
    pub fn validate(&self) -> Result<()> {
        if self.cluster.name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "cluster.name",
            }
            .into());
        }
        if self.cluster.api_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cluster.api_port",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        let url = Url::parse(&self.platform.base_url).map_err(|err| ConfigError::InvalidValue {
            field: "platform.base_url",
            reason: err.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "platform.base_url",
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }
            .into());
        }
        positive("platform.timeout_ms", self.platform.timeout_ms)?;

        if self.ssh.user.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "ssh.user" }.into());
        }
        positive("ssh.connect_timeout_secs", self.ssh.connect_timeout_secs)?;
        positive("ssh.command_timeout_secs", self.ssh.command_timeout_secs)?;

        positive("provision.poll_interval_secs", self.provision.poll_interval_secs)?;
        positive("provision.boot_timeout_secs", self.provision.boot_timeout_secs)?;
        positive("provision.probe_timeout_secs", self.provision.probe_timeout_secs)?;

        if self.executor.max_parallelism == 0 {
            return Err(ConfigError::InvalidValue {
                field: "executor.max_parallelism",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.retry.max_delay_secs < self.retry.initial_delay_secs {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_delay_secs",
                reason: "must be >= initial_delay_secs".to_string(),
            }
            .into());
        }
        if !(self.retry.multiplier >= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "retry.multiplier",
                reason: "must be >= 1.0".to_string(),
            }
            .into());
        }

        positive("health.poll_interval_secs", self.health.poll_interval_secs)?;
        positive("health.timeout_secs", self.health.timeout_secs)?;
        positive("health.check_timeout_secs", self.health.check_timeout_secs)?;
        let quorum = self.health.worker_quorum;
        if !(quorum > 0.0 && quorum <= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "health.worker_quorum",
                reason: "must be in (0, 1]".to_string(),
            }
            .into());
        }

        for (name, procedure) in self.procedures.iter() {
            if procedure.command.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "procedures",
                    reason: format!("procedure '{name}' has an empty command"),
                }
                .into());
            }
        }

        self.fleet()?;
        Ok(())
    }

    /// The validated fleet described by `[[nodes]]`.
    pub fn fleet(&self) -> Result<FleetSpec> {
        let nodes = self.nodes.iter().map(NodeSpec::from).collect();
        Ok(FleetSpec::new(self.cluster.name.clone(), nodes)?)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_secs(self.retry.initial_delay_secs),
            max_delay: Duration::from_secs(self.retry.max_delay_secs),
            multiplier: self.retry.multiplier,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.command_timeout_secs)
    }

    pub fn cluster_procedures(&self) -> ClusterProcedures {
        ClusterProcedures {
            probe: self.procedures.probe.to_procedure("probe"),
            bootstrap: self.procedures.bootstrap.to_procedure("bootstrap"),
            join: self.procedures.join.to_procedure("join"),
            ready: self.procedures.ready.to_procedure("ready"),
        }
    }

    /// Orchestrator settings with `overrides` applied.
    pub fn orchestrator_settings(&self, overrides: Overrides) -> Result<OrchestratorSettings> {
        if overrides.parallel == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "parallel",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if overrides.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "timeout",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        let boot_timeout = overrides
            .timeout_secs
            .unwrap_or(self.provision.boot_timeout_secs);

        Ok(OrchestratorSettings {
            max_parallelism: overrides.parallel.unwrap_or(self.executor.max_parallelism),
            idempotent: overrides.idempotent,
            retry: self.retry_policy(),
            provision: ProvisionSettings {
                poll_interval: Duration::from_secs(self.provision.poll_interval_secs),
                boot_timeout: Duration::from_secs(boot_timeout),
                probe_timeout: Duration::from_secs(self.provision.probe_timeout_secs),
            },
            health: HealthSettings {
                poll_interval: Duration::from_secs(self.health.poll_interval_secs),
                timeout: Duration::from_secs(self.health.timeout_secs),
                check_timeout: Duration::from_secs(self.health.check_timeout_secs),
                worker_quorum: self.health.worker_quorum,
            },
            api_port: self.cluster.api_port,
            install: self.procedures.install.to_procedure("install"),
            command_timeout: self.command_timeout(),
        })
    }
}
