//! Fleet operator capability surface for inbound adapters.
//!
//! Every use-case takes the raw TOML configuration so adapters never deal in
//! file paths or concrete infrastructure.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::application::orchestration::report::{DeployReport, DestroyReport, Plan, StatusReport};
use crate::application::progress::ProgressReporter;
use crate::domain::DeploymentState;
use crate::error::Result;

/// Flags that take precedence over the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overrides {
    /// Override for the executor parallelism bound.
    pub parallel: Option<usize>,

    /// Override for the node boot timeout, in seconds.
    pub timeout_secs: Option<u64>,

    /// Adopt existing state instead of refusing to touch it.
    pub idempotent: bool,
}

impl Default for Overrides {
    fn default() -> Self {
        Self {
            parallel: None,
            timeout_secs: None,
            idempotent: true,
        }
    }
}

/// Resolved fleet facts shown before a command runs.
#[derive(Debug, Clone)]
pub struct FleetSummary {
    pub cluster: String,
    pub nodes: usize,
    pub control_planes: usize,
    pub workers: usize,
    pub max_parallelism: usize,
    pub platform: String,
}

/// Fleet lifecycle use-cases for operator-facing adapters.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait FleetOperator: Send + Sync {
    /// Install the global tracing subscriber.
    ///
    /// Falls back to default logging when `config_toml` is absent or its
    /// `[logging]` table cannot be read.
    fn init_logging(&self, config_toml: Option<&str>, verbose: u8, quiet: bool);

    /// Validate the configuration and summarize the fleet it declares.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the content is malformed or invalid.
    fn summary(&self, config_toml: &str, overrides: Overrides) -> Result<FleetSummary>;

    /// Describe what a deploy would do without changing anything.
    async fn plan(&self, config_toml: &str, overrides: Overrides) -> Result<Plan>;

    /// Converge the fleet to the declared configuration.
    ///
    /// Setting `cancel` to `true` stops dispatching new jobs; in-flight jobs
    /// finish and their results are persisted.
    async fn deploy(
        &self,
        config_toml: &str,
        overrides: Overrides,
        progress: ProgressReporter,
        cancel: watch::Receiver<bool>,
    ) -> Result<DeployReport>;

    /// Deployment state as last persisted.
    fn recorded(&self, config_toml: &str) -> Result<DeploymentState>;

    /// Refresh and report the health of every recorded node.
    async fn status(&self, config_toml: &str) -> Result<StatusReport>;

    /// Delete every recorded node, then the token and state.
    async fn destroy(&self, config_toml: &str) -> Result<DestroyReport>;
}
