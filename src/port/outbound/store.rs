//! Persistence ports for deployment state and the cluster token.
//!
//! Only the orchestrator process writes through these. Implementations must
//! replace files atomically so a reader never observes a partial document.

use crate::domain::{ClusterToken, DeploymentState};
use crate::error::Result;

pub trait StateStore: Send + Sync {
    /// Load the persisted state, or an empty state when none exists.
    fn load(&self) -> Result<DeploymentState>;

    /// Atomically replace the persisted state.
    fn persist(&self, state: &DeploymentState) -> Result<()>;

    /// Whether any state has been persisted.
    fn exists(&self) -> bool;
}

pub trait TokenStore: Send + Sync {
    /// Load the token, `None` when absent.
    fn load(&self) -> Result<Option<ClusterToken>>;

    /// Atomically write the token with restricted permissions.
    fn save(&self, token: &ClusterToken) -> Result<()>;

    /// Remove the token. Removing an absent token is a no-op.
    fn remove(&self) -> Result<()>;
}
