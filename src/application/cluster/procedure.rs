//! Cluster runtime driven by configured remote procedures.
//!
//! Each runtime operation maps to one procedure run over the remote channel.
//! The membership probe prints one member name per line on stdout; the ready
//! procedure exits zero when the node's service is ready.

use async_trait::async_trait;

use crate::application::installer::{Installer, Procedure, ProcedureParams};
use crate::domain::{ClusterToken, NodeHealth};
use crate::error::{Error, InfraError, Result};
use crate::port::outbound::remote::RemoteNode;
use crate::port::outbound::runtime::ClusterRuntime;

/// Procedures behind each runtime operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterProcedures {
    pub probe: Procedure,
    pub bootstrap: Procedure,
    pub join: Procedure,
    pub ready: Procedure,
}

pub struct ProcedureClusterRuntime {
    installer: Installer,
    procedures: ClusterProcedures,
    cluster: String,
}

impl ProcedureClusterRuntime {
    pub fn new(
        installer: Installer,
        procedures: ClusterProcedures,
        cluster: impl Into<String>,
    ) -> Self {
        Self {
            installer,
            procedures,
            cluster: cluster.into(),
        }
    }

    fn params(&self) -> ProcedureParams {
        ProcedureParams::new().with("cluster", self.cluster.as_str())
    }

    fn token_params(&self, token: &ClusterToken) -> ProcedureParams {
        self.params()
            .with("token", token.secret())
            .with("endpoint", token.endpoint())
    }
}

#[async_trait]
impl ClusterRuntime for ProcedureClusterRuntime {
    async fn members(&self, control: &RemoteNode) -> Result<Vec<String>> {
        let output = self
            .installer
            .run_once(control, &self.procedures.probe, &self.params())
            .await?;

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn bootstrap(&self, control: &RemoteNode, token: &ClusterToken) -> Result<()> {
        self.installer
            .run_once(control, &self.procedures.bootstrap, &self.token_params(token))
            .await?;
        Ok(())
    }

    async fn join(&self, node: &RemoteNode, token: &ClusterToken) -> Result<()> {
        let params = self.token_params(token).with("role", node.role.as_str());
        self.installer
            .run_once(node, &self.procedures.join, &params)
            .await?;
        Ok(())
    }

    async fn ready(&self, node: &RemoteNode) -> Result<NodeHealth> {
        match self
            .installer
            .run_once(node, &self.procedures.ready, &self.params())
            .await
        {
            Ok(_) => Ok(NodeHealth::Healthy),
            Err(Error::Infra(InfraError::ProcedureFailed { .. })) => Ok(NodeHealth::Degraded),
            Err(err) if err.is_transient() => Ok(NodeHealth::Unreachable),
            Err(err) => Err(err),
        }
    }
}
