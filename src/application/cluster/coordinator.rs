//! Cluster formation coordinator.
//!
//! Bootstraps the control plane at most once per cluster lifetime. Before
//! any bootstrap the coordinator looks for evidence that the cluster already
//! exists, first the local token file and then the runtime's member list.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::application::executor::JobHandle;
use crate::application::retry::with_transient_retry;
use crate::domain::{ClusterToken, FormationState, RetryPolicy};
use crate::error::{Error, InfraError, Result};
use crate::port::outbound::remote::RemoteNode;
use crate::port::outbound::runtime::ClusterRuntime;
use crate::port::outbound::store::TokenStore;

/// Default port of the control-plane API.
pub const DEFAULT_API_PORT: u16 = 6443;

/// How the control plane became ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootstrapOutcome {
    /// This run bootstrapped the cluster and persisted the token.
    Bootstrapped,
    /// The runtime already reports members; no bootstrap was attempted.
    AlreadyFormed,
    /// A token file from an earlier bootstrap exists.
    TokenOnFile,
}

impl BootstrapOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bootstrapped => "bootstrapped",
            Self::AlreadyFormed => "already-formed",
            Self::TokenOnFile => "token-on-file",
        }
    }
}

/// Control-plane endpoint for a node address.
#[must_use]
pub fn control_endpoint(address: &str, api_port: u16) -> String {
    format!("https://{address}:{api_port}")
}

/// Drives the formation state machine for one run.
pub struct FormationCoordinator {
    runtime: Arc<dyn ClusterRuntime>,
    tokens: Arc<dyn TokenStore>,
    retry: RetryPolicy,
    api_port: u16,
    state: FormationState,
}

impl FormationCoordinator {
    pub fn new(
        runtime: Arc<dyn ClusterRuntime>,
        tokens: Arc<dyn TokenStore>,
        retry: RetryPolicy,
        api_port: u16,
    ) -> Self {
        Self {
            runtime,
            tokens,
            retry,
            api_port,
            state: FormationState::default(),
        }
    }

    pub fn state(&self) -> &FormationState {
        &self.state
    }

    /// Members known to `control`, retrying transient failures.
    pub async fn members(&self, control: &RemoteNode) -> Result<Vec<String>> {
        with_transient_retry(&self.retry, "runtime.members", None, |_| {
            self.runtime.members(control)
        })
        .await
    }

    /// Make sure the control plane on `control` is up, bootstrapping it only
    /// when there is no evidence of an existing cluster.
    pub async fn ensure_control_plane(&mut self, control: &RemoteNode) -> Result<BootstrapOutcome> {
        if let Some(token) = self.tokens.load()? {
            info!(
                node = %control.name,
                endpoint = token.endpoint(),
                token = token.prefix(),
                "Cluster token on file, skipping bootstrap"
            );
            self.state.control_plane_ready(Some(token))?;
            return Ok(BootstrapOutcome::TokenOnFile);
        }

        let members = self.members(control).await?;
        if !members.is_empty() {
            warn!(
                node = %control.name,
                members = members.len(),
                "Cluster already has members but no token is on file; joins need the token restored"
            );
            self.state.control_plane_ready(None)?;
            return Ok(BootstrapOutcome::AlreadyFormed);
        }

        self.state.begin_bootstrap()?;
        let token = ClusterToken::generate(
            control_endpoint(&control.address, self.api_port),
            &mut rand::thread_rng(),
        );
        info!(
            node = %control.name,
            endpoint = token.endpoint(),
            token = token.prefix(),
            "Bootstrapping control plane"
        );

        match self.bootstrap_once(control, &token).await {
            Ok(()) => {}
            Err(Error::Infra(InfraError::BootstrapAlreadyDone { endpoint })) => {
                warn!(node = %control.name, endpoint, "Control plane was already bootstrapped");
                self.state.control_plane_ready(None)?;
                return Ok(BootstrapOutcome::AlreadyFormed);
            }
            Err(err) => return Err(err),
        }

        self.tokens.save(&token)?;
        info!(node = %control.name, token = token.prefix(), "Control plane bootstrapped");
        self.state.control_plane_ready(Some(token))?;
        Ok(BootstrapOutcome::Bootstrapped)
    }

    /// Call bootstrap, re-checking membership after every transient failure so
    /// a call that took effect is never repeated.
    async fn bootstrap_once(&self, control: &RemoteNode, token: &ClusterToken) -> Result<()> {
        let mut attempt = 1;
        loop {
            let err = match self.runtime.bootstrap(control, token).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            if !err.is_transient() || !self.retry.allows_retry_after(attempt) {
                return Err(err);
            }

            sleep(self.retry.delay_after(attempt)).await;
            match self.runtime.members(control).await {
                Ok(members) if !members.is_empty() => {
                    info!(node = %control.name, "Bootstrap took effect despite the error");
                    return Ok(());
                }
                Ok(_) => {}
                Err(probe_err) => {
                    // Unknown outcome. Bootstrapping again could form a second cluster.
                    warn!(
                        node = %control.name,
                        error = %probe_err,
                        "Cannot confirm bootstrap outcome, giving up"
                    );
                    return Err(err);
                }
            }

            warn!(node = %control.name, attempt, error = %err, "Retrying bootstrap");
            attempt += 1;
        }
    }

    pub fn begin_joining(&mut self) -> Result<()> {
        self.state.begin_joining()
    }

    pub fn formed(&mut self) -> Result<()> {
        self.state.formed()
    }

    /// Join handle shared by the join jobs of this run.
    pub fn joiner(&self) -> Joiner {
        Joiner {
            runtime: Arc::clone(&self.runtime),
            tokens: Arc::clone(&self.tokens),
            retry: self.retry.clone(),
        }
    }
}

/// Joins one node to the cluster. Cheap to clone into worker tasks.
#[derive(Clone)]
pub struct Joiner {
    runtime: Arc<dyn ClusterRuntime>,
    tokens: Arc<dyn TokenStore>,
    retry: RetryPolicy,
}

impl Joiner {
    /// Join `node`, re-reading the token file on every attempt.
    ///
    /// A missing token file is transient: it is retried under the policy and
    /// fails the node once attempts run out.
    pub async fn join(&self, node: &RemoteNode, handle: Option<&JobHandle>) -> Result<()> {
        with_transient_retry(&self.retry, "runtime.join", handle, |attempt| async move {
            let token = self
                .tokens
                .load()?
                .ok_or_else(|| Error::transient("cluster token file not found"))?;
            debug!(node = %node.name, attempt, token = token.prefix(), "Joining cluster");
            self.runtime.join(node, &token).await
        })
        .await?;

        info!(node = %node.name, role = %node.role, "Node joined cluster");
        Ok(())
    }
}
