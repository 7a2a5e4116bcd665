//! Cluster runtime port.
//!
//! The distributed runtime being installed. The orchestration core only needs
//! four things from it: membership evidence, a one-time bootstrap, joining,
//! and per-node readiness.

use async_trait::async_trait;

use super::remote::RemoteNode;
use crate::domain::{ClusterToken, NodeHealth};
use crate::error::Result;

#[async_trait]
pub trait ClusterRuntime: Send + Sync {
    /// Members currently known to the control endpoint on `control`.
    ///
    /// An empty list means there is no evidence of an existing cluster.
    async fn members(&self, control: &RemoteNode) -> Result<Vec<String>>;

    /// Bootstrap the consensus layer on `control` using `token`.
    ///
    /// Must only ever be called once per cluster lifetime.
    async fn bootstrap(&self, control: &RemoteNode, token: &ClusterToken) -> Result<()>;

    /// Join `node` to the cluster behind `token`.
    async fn join(&self, node: &RemoteNode, token: &ClusterToken) -> Result<()>;

    /// Readiness of the runtime service on `node`.
    async fn ready(&self, node: &RemoteNode) -> Result<NodeHealth>;
}
