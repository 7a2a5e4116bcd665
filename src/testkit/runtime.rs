//! In-memory cluster runtime.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{ClusterToken, NodeHealth};
use crate::error::{Error, InfraError, Result};
use crate::port::outbound::remote::RemoteNode;
use crate::port::outbound::runtime::ClusterRuntime;

#[derive(Default)]
struct Inner {
    members: Vec<String>,
    token: Option<String>,
    bootstrap_calls: usize,
    join_calls: BTreeMap<String, usize>,
    unreachable: HashSet<String>,
    flaky_bootstrap: bool,
}

/// Fake runtime counting bootstrap and join calls.
///
/// A node is ready once it is a member. Unreachable nodes fail every call
/// with a transient error.
#[derive(Default)]
pub struct FakeRuntime {
    inner: Mutex<Inner>,
}

impl FakeRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a cluster that already has `members`.
    #[must_use]
    pub fn with_members<const N: usize>(self, members: [&str; N]) -> Self {
        self.inner.lock().members = members.iter().map(|m| m.to_string()).collect();
        self
    }

    /// The first bootstrap takes effect but reports a transient error.
    #[must_use]
    pub fn with_flaky_bootstrap(self) -> Self {
        self.inner.lock().flaky_bootstrap = true;
        self
    }

    pub fn unreachable(&self, node: &str) {
        self.inner.lock().unreachable.insert(node.to_string());
    }

    #[must_use]
    pub fn bootstrap_calls(&self) -> usize {
        self.inner.lock().bootstrap_calls
    }

    #[must_use]
    pub fn join_calls(&self, node: &str) -> usize {
        self.inner.lock().join_calls.get(node).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn members_list(&self) -> Vec<String> {
        self.inner.lock().members.clone()
    }

    fn check_reachable(inner: &Inner, node: &RemoteNode) -> Result<()> {
        if inner.unreachable.contains(&node.name) {
            return Err(Error::transient(format!("{} unreachable", node.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterRuntime for FakeRuntime {
    async fn members(&self, control: &RemoteNode) -> Result<Vec<String>> {
        let inner = self.inner.lock();
        Self::check_reachable(&inner, control)?;
        Ok(inner.members.clone())
    }

    async fn bootstrap(&self, control: &RemoteNode, token: &ClusterToken) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.bootstrap_calls += 1;
        Self::check_reachable(&inner, control)?;
        if !inner.members.is_empty() {
            return Err(Error::Infra(InfraError::BootstrapAlreadyDone {
                endpoint: token.endpoint().to_string(),
            }));
        }

        inner.members.push(control.name.clone());
        inner.token = Some(token.secret().to_string());
        if inner.flaky_bootstrap {
            inner.flaky_bootstrap = false;
            return Err(Error::transient("connection reset during bootstrap"));
        }
        Ok(())
    }

    async fn join(&self, node: &RemoteNode, token: &ClusterToken) -> Result<()> {
        let mut inner = self.inner.lock();
        *inner.join_calls.entry(node.name.clone()).or_default() += 1;
        Self::check_reachable(&inner, node)?;
        if let Some(expected) = &inner.token {
            if expected != token.secret() {
                return Err(Error::Infra(InfraError::Rejected(format!(
                    "{} presented an invalid token",
                    node.name
                ))));
            }
        }
        if !inner.members.contains(&node.name) {
            inner.members.push(node.name.clone());
        }
        Ok(())
    }

    async fn ready(&self, node: &RemoteNode) -> Result<NodeHealth> {
        let inner = self.inner.lock();
        Self::check_reachable(&inner, node)?;
        if inner.members.contains(&node.name) {
            Ok(NodeHealth::Healthy)
        } else {
            Ok(NodeHealth::Degraded)
        }
    }
}
