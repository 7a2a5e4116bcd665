//! Deployment orchestrator.
//!
//! Single writer of the deployment state. Drives the phases in order:
//!
//! 1. **provision**: create or adopt every node, in parallel
//! 2. **bootstrap**: bring up the control plane, exactly once
//! 3. **join**: join the remaining nodes, in parallel
//! 4. **install**: run the install procedure on every member, in parallel
//! 5. **verify**: poll health until healthy or timed out
//!
//! A phase starts only after every job of the previous one is terminal. State
//! is persisted after each terminal job outcome.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::report::{DeployReport, DestroyReport, NodeOutcome, NodeReport, Plan, StatusReport};
use crate::application::cluster::coordinator::{FormationCoordinator, DEFAULT_API_PORT};
use crate::application::executor::{
    JobObserver, ParallelExecutor, PhaseReport, DEFAULT_MAX_PARALLELISM,
};
use crate::application::health::{HealthMonitor, HealthSettings};
use crate::application::installer::{
    Installer, Procedure, ProcedureParams, DEFAULT_COMMAND_TIMEOUT,
};
use crate::application::progress::ProgressReporter;
use crate::application::provision::{ProvisionSettings, Provisioner};
use crate::domain::{
    ClusterHealth, DeploymentPhase, DeploymentState, FleetSpec, Job, JobKind, NodeSpec, Phase,
    RetryPolicy,
};
use crate::error::{ConfigError, Error, InfraError, Result};
use crate::port::outbound::platform::ComputePlatform;
use crate::port::outbound::remote::{RemoteChannel, RemoteNode};
use crate::port::outbound::resolver::NameResolver;
use crate::port::outbound::runtime::ClusterRuntime;
use crate::port::outbound::store::{StateStore, TokenStore};

/// Outbound adapters the orchestrator drives.
pub struct Dependencies {
    pub platform: Arc<dyn ComputePlatform>,
    pub channel: Arc<dyn RemoteChannel>,
    pub resolver: Arc<dyn NameResolver>,
    pub runtime: Arc<dyn ClusterRuntime>,
    pub state: Arc<dyn StateStore>,
    pub tokens: Arc<dyn TokenStore>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_parallelism: usize,
    /// Adopt existing state. When off, a deploy refuses to run over it.
    pub idempotent: bool,
    pub retry: RetryPolicy,
    pub provision: ProvisionSettings,
    pub health: HealthSettings,
    pub api_port: u16,
    pub install: Procedure,
    /// Upper bound on one remote procedure run.
    pub command_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            idempotent: true,
            retry: RetryPolicy::default(),
            provision: ProvisionSettings::default(),
            health: HealthSettings::default(),
            api_port: DEFAULT_API_PORT,
            install: Procedure::new("install", "fleet-install"),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

pub struct Orchestrator {
    fleet: FleetSpec,
    store: Arc<dyn StateStore>,
    tokens: Arc<dyn TokenStore>,
    runtime: Arc<dyn ClusterRuntime>,
    provisioner: Provisioner,
    installer: Installer,
    monitor: HealthMonitor,
    executor: ParallelExecutor,
    progress: ProgressReporter,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(fleet: FleetSpec, deps: Dependencies, settings: OrchestratorSettings) -> Self {
        let provisioner = Provisioner::new(
            deps.platform,
            deps.resolver,
            settings.retry.clone(),
            settings.provision,
        );
        let installer = Installer::new(deps.channel, settings.retry.clone())
            .with_command_timeout(settings.command_timeout);
        let monitor = HealthMonitor::new(Arc::clone(&deps.runtime), settings.health);

        Self {
            fleet,
            store: deps.state,
            tokens: deps.tokens,
            runtime: deps.runtime,
            provisioner,
            installer,
            monitor,
            executor: ParallelExecutor::new(settings.max_parallelism),
            progress: ProgressReporter::disabled(),
            settings,
        }
    }

    /// Stop dispatching new jobs once `cancel` reads `true`.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.executor = self.executor.with_cancellation(cancel);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.executor = self.executor.with_observer(observer);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn fleet(&self) -> &FleetSpec {
        &self.fleet
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// The persisted state as it stands, without probing anything.
    pub fn recorded(&self) -> Result<DeploymentState> {
        self.store.load()
    }

    fn persist(&self, state: &mut DeploymentState) -> Result<()> {
        state.touch();
        self.store.persist(state)
    }

    fn jobs<'a>(&self, kind: JobKind, specs: impl IntoIterator<Item = &'a NodeSpec>) -> Vec<Job> {
        specs
            .into_iter()
            .map(|spec| Job::new(kind, spec.clone(), self.settings.retry.max_attempts))
            .collect()
    }

    /// Remote handles for `specs`, addressed from their records.
    fn remotes<'a>(
        state: &DeploymentState,
        specs: impl IntoIterator<Item = &'a NodeSpec>,
    ) -> Arc<BTreeMap<String, RemoteNode>> {
        Arc::new(
            specs
                .into_iter()
                .filter_map(|spec| {
                    state.record(&spec.name).map(|record| {
                        (spec.name.clone(), RemoteNode::from_record(&spec.name, record))
                    })
                })
                .collect(),
        )
    }

    /// Dry run: load, probe and reconcile without mutating anything.
    pub async fn plan(&self) -> Result<Plan> {
        let state = self.store.load()?;
        let mut entries = Vec::with_capacity(self.fleet.nodes().len());
        for spec in self.fleet.nodes() {
            let record = state.record(&spec.name);
            let action = self.provisioner.plan(spec, record).await?;
            entries.push(Plan::entry(
                &spec.name,
                spec.role,
                &action,
                record.map(|record| record.id.to_string()),
            ));
        }

        Ok(Plan {
            entries,
            orphans: Plan::orphans_of(&self.fleet, &state),
        })
    }

    /// Run every phase. Fails only on fatal errors or when state cannot be
    /// persisted; per-node failures are in the report.
    pub async fn deploy(&self) -> Result<DeployReport> {
        let mut state = self.store.load()?;
        if !self.settings.idempotent && !state.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "idempotent",
                reason: "deployment state already exists; run with --idempotent to adopt it"
                    .into(),
            }
            .into());
        }
        info!(
            cluster = self.fleet.cluster(),
            nodes = self.fleet.nodes().len(),
            phase = %state.phase,
            max_parallelism = self.executor.max_parallelism(),
            "Deploy starting"
        );
        self.preflight(&state).await?;

        let nodes = self.provision(&mut state).await?;
        let mut report = DeployReport {
            cluster: self.fleet.cluster().to_string(),
            phase: state.phase,
            nodes,
            bootstrap: None,
            health: None,
            cancelled: false,
        };

        if !self.interrupted(&mut report) {
            let members = self.form(&mut state, &mut report).await?;
            if !members.is_empty() && !self.interrupted(&mut report) {
                self.install(&mut state, &mut report, &members).await?;
            }
        }

        if !self.interrupted(&mut report) && !state.nodes.is_empty() {
            self.verify(&mut state, &mut report).await?;
        }

        report.phase = state.phase;
        info!(
            cluster = %report.cluster,
            phase = %report.phase,
            created = report.count(NodeOutcome::Created),
            adopted = report.count(NodeOutcome::Adopted),
            failed = report.count(NodeOutcome::Failed),
            health = ?report.health,
            "Deploy finished"
        );
        Ok(report)
    }

    /// Reconcile every recorded node before any job runs, so a record that
    /// no longer matches its resource aborts the deploy with nothing mutated.
    async fn preflight(&self, state: &DeploymentState) -> Result<()> {
        for spec in self.fleet.nodes() {
            if let Some(record) = state.record(&spec.name) {
                self.provisioner.plan(spec, Some(record)).await?;
            }
        }
        Ok(())
    }

    fn interrupted(&self, report: &mut DeployReport) -> bool {
        if self.executor.is_cancelled() {
            warn!("Cancelled, no further phases will run");
            report.cancelled = true;
        }
        report.cancelled
    }

    /// Split a phase's fatal error out, or report a failed persist.
    fn settle<T>(phase: &mut PhaseReport<T>, persist_error: Option<Error>) -> Result<()> {
        if let Some(err) = phase.take_fatal() {
            return Err(err);
        }
        match persist_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn provision(&self, state: &mut DeploymentState) -> Result<Vec<NodeReport>> {
        let total = self.fleet.nodes().len();
        let existing = Arc::new(state.nodes.clone());
        let provisioner = self.provisioner.clone();
        let mut reports: BTreeMap<String, NodeReport> = BTreeMap::new();
        let mut persist_error = None;
        let mut done = 0;
        self.progress.begin(Phase::Provision);

        let mut phase = self
            .executor
            .run(
                Phase::Provision,
                self.jobs(JobKind::Provision, self.fleet.nodes()),
                move |handle| {
                    let provisioner = provisioner.clone();
                    let existing = Arc::clone(&existing);
                    async move {
                        let spec = handle.target();
                        provisioner
                            .create_or_adopt(&spec, existing.get(&spec.name), Some(&handle))
                            .await
                    }
                },
                |job, result| {
                    let spec = &job.target;
                    let node = match result {
                        Ok(provisioned) => {
                            state.upsert(spec.name.clone(), provisioned.record.clone());
                            let mut node = NodeReport::new(
                                spec.name.clone(),
                                spec.role,
                                provisioned.outcome.into(),
                            );
                            node.status = Some(provisioned.record.last_status);
                            node
                        }
                        Err(err) => {
                            NodeReport::failed(spec.name.clone(), spec.role, Phase::Provision, err)
                        }
                    };
                    reports.insert(spec.name.clone(), node);

                    if let Err(err) = self.persist(state) {
                        error!(error = %err, "Failed to persist deployment state");
                        persist_error.get_or_insert(err);
                    }
                    done += 1;
                    self.progress.report(Phase::Provision, done, total);
                },
            )
            .await;

        Self::settle(&mut phase, persist_error)?;
        if !phase.is_failed() {
            state.advance(DeploymentPhase::Provisioned);
            self.persist(state)?;
        }

        Ok(self
            .fleet
            .nodes()
            .iter()
            .filter_map(|spec| reports.remove(&spec.name))
            .collect())
    }

    /// Bootstrap and join. Returns the names of nodes that are cluster
    /// members afterwards, in fleet order.
    async fn form(
        &self,
        state: &mut DeploymentState,
        report: &mut DeployReport,
    ) -> Result<Vec<String>> {
        let primary = self.fleet.primary_control_plane();
        let control = match (report.node(&primary.name), state.record(&primary.name)) {
            (Some(node), Some(record)) if !node.is_failed() => {
                RemoteNode::from_record(&primary.name, record)
            }
            _ => {
                warn!(
                    node = %primary.name,
                    "Primary control-plane node is not provisioned; skipping cluster formation"
                );
                return Ok(Vec::new());
            }
        };

        self.progress.begin(Phase::Bootstrap);
        let mut coordinator = FormationCoordinator::new(
            Arc::clone(&self.runtime),
            Arc::clone(&self.tokens),
            self.settings.retry.clone(),
            self.settings.api_port,
        );
        match coordinator.ensure_control_plane(&control).await {
            Ok(outcome) => report.bootstrap = Some(outcome),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                error!(node = %primary.name, error = %err, "Control-plane bootstrap failed");
                if let Some(node) = report.node_mut(&primary.name) {
                    node.fail(Phase::Bootstrap, &err);
                }
                return Ok(Vec::new());
            }
        }
        self.progress.report(Phase::Bootstrap, 1, 1);
        state.advance(DeploymentPhase::ControlPlaneReady);
        self.persist(state)?;

        if self.interrupted(report) {
            return Ok(vec![primary.name.clone()]);
        }

        coordinator.begin_joining()?;
        let members: HashSet<String> = match coordinator.members(&control).await {
            Ok(members) => members.into_iter().collect(),
            Err(err) => {
                warn!(error = %err, "Membership probe failed; joining every node");
                HashSet::new()
            }
        };

        let candidates: Vec<&NodeSpec> = self
            .fleet
            .nodes()
            .iter()
            .filter(|spec| spec.name != primary.name)
            .filter(|spec| report.node(&spec.name).is_some_and(|node| !node.is_failed()))
            .collect();
        let (already, pending): (Vec<&NodeSpec>, Vec<&NodeSpec>) = candidates
            .into_iter()
            .partition(|spec| members.contains(&spec.name));
        for spec in &already {
            debug!(node = %spec.name, "Already a cluster member");
        }

        let total = pending.len();
        let remotes = Self::remotes(state, pending.iter().copied());
        let joiner = coordinator.joiner();
        let mut joined: HashSet<String> = HashSet::new();
        let mut persist_error = None;
        let mut done = 0;
        self.progress.begin(Phase::Join);

        let mut phase = self
            .executor
            .run(
                Phase::Join,
                self.jobs(JobKind::Join, pending.iter().copied()),
                move |handle| {
                    let joiner = joiner.clone();
                    let remotes = Arc::clone(&remotes);
                    async move {
                        let name = handle.target().name;
                        let node = remotes
                            .get(&name)
                            .cloned()
                            .ok_or(Error::Infra(InfraError::NotFound { id: name }))?;
                        joiner.join(&node, Some(&handle)).await
                    }
                },
                |job, result| {
                    match result {
                        Ok(()) => {
                            joined.insert(job.target.name.clone());
                        }
                        Err(err) => {
                            if let Some(node) = report.node_mut(&job.target.name) {
                                node.fail(Phase::Join, err);
                            }
                        }
                    }
                    if let Err(err) = self.persist(state) {
                        error!(error = %err, "Failed to persist deployment state");
                        persist_error.get_or_insert(err);
                    }
                    done += 1;
                    self.progress.report(Phase::Join, done, total);
                },
            )
            .await;

        Self::settle(&mut phase, persist_error)?;
        if !phase.is_failed() {
            coordinator.formed()?;
            state.advance(DeploymentPhase::ClusterFormed);
            self.persist(state)?;
            info!(cluster = self.fleet.cluster(), "Cluster formed");
        }

        Ok(self
            .fleet
            .nodes()
            .iter()
            .filter(|spec| {
                spec.name == primary.name
                    || already.iter().any(|member| member.name == spec.name)
                    || joined.contains(&spec.name)
            })
            .map(|spec| spec.name.clone())
            .collect())
    }

    async fn install(
        &self,
        state: &mut DeploymentState,
        report: &mut DeployReport,
        members: &[String],
    ) -> Result<()> {
        let specs: Vec<&NodeSpec> = members
            .iter()
            .filter_map(|name| self.fleet.get(name))
            .collect();
        let total = specs.len();
        let remotes = Self::remotes(state, specs.iter().copied());
        let installer = self.installer.clone();
        let procedure = self.settings.install.clone();
        let cluster = self.fleet.cluster().to_string();
        let api_port = self.settings.api_port;
        let mut persist_error = None;
        let mut done = 0;
        self.progress.begin(Phase::Install);

        let mut phase = self
            .executor
            .run(
                Phase::Install,
                self.jobs(JobKind::Install, specs.iter().copied()),
                move |handle| {
                    let installer = installer.clone();
                    let remotes = Arc::clone(&remotes);
                    let procedure = procedure.clone();
                    let params = ProcedureParams::new()
                        .with("cluster", cluster.as_str())
                        .with("api_port", api_port);
                    async move {
                        let name = handle.target().name;
                        let node = remotes
                            .get(&name)
                            .cloned()
                            .ok_or(Error::Infra(InfraError::NotFound { id: name }))?;
                        let params = params.with("role", node.role.as_str());
                        installer
                            .run_remote(&node, &procedure, &params, Some(&handle))
                            .await
                            .map(|_| ())
                    }
                },
                |job, result| {
                    if let Err(err) = result {
                        if let Some(node) = report.node_mut(&job.target.name) {
                            node.fail(Phase::Install, err);
                        }
                    }
                    if let Err(err) = self.persist(state) {
                        error!(error = %err, "Failed to persist deployment state");
                        persist_error.get_or_insert(err);
                    }
                    done += 1;
                    self.progress.report(Phase::Install, done, total);
                },
            )
            .await;

        Self::settle(&mut phase, persist_error)?;
        if !phase.is_failed() && state.phase >= DeploymentPhase::ClusterFormed {
            state.advance(DeploymentPhase::Installed);
            self.persist(state)?;
        }
        Ok(())
    }

    async fn verify(&self, state: &mut DeploymentState, report: &mut DeployReport) -> Result<()> {
        let convergence = self.monitor.wait_converged(state, &self.progress).await;

        for check in convergence.report.checks() {
            if let Some(node) = report.node_mut(check.name()) {
                node.status = Some(check.health().status());
            }
        }
        report.health = Some(convergence.health);

        let clean = report.failed().next().is_none();
        if convergence.health == ClusterHealth::Healthy
            && clean
            && state.phase >= DeploymentPhase::Installed
        {
            state.advance(DeploymentPhase::Verified);
        }
        self.persist(state)
    }

    /// Poll every recorded node once. Never writes state.
    pub async fn status(&self) -> Result<StatusReport> {
        let mut state = self.store.load()?;
        if state.nodes.is_empty() {
            return Ok(StatusReport {
                state,
                checks: None,
                health: None,
            });
        }

        let checks = self.monitor.check_once(&state).await;
        HealthMonitor::apply(&mut state, &checks);
        let health = self.monitor.aggregate(&checks);
        Ok(StatusReport {
            state,
            checks: Some(checks),
            health: Some(health),
        })
    }

    /// Delete every recorded resource, then the token and the state.
    ///
    /// Records whose deletion failed are kept, as is the token, so a later
    /// destroy can finish the job.
    pub async fn destroy(&self) -> Result<DestroyReport> {
        let mut report = DestroyReport::default();
        if !self.store.exists() {
            self.tokens.remove()?;
            report.token_removed = true;
            return Ok(report);
        }

        let mut state = self.store.load()?;
        let records: Vec<_> = state
            .nodes
            .iter()
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect();

        for (name, record) in records {
            match self.provisioner.teardown(&name, &record).await {
                Ok(()) => {
                    state.remove(&name);
                    self.persist(&mut state)?;
                    report.deleted.push(name);
                }
                Err(err) => {
                    warn!(node = %name, error = %err, "Failed to delete node");
                    report.failed.push((name, err.to_string()));
                }
            }
        }

        if report.failed.is_empty() {
            self.tokens.remove()?;
            report.token_removed = true;
            state.reset();
            self.persist(&mut state)?;
            info!(cluster = self.fleet.cluster(), "Fleet destroyed");
        }
        Ok(report)
    }
}
