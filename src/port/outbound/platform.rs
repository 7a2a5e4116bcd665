//! Compute platform port.
//!
//! The virtualization platform that owns the fleet's resources. Everything
//! about the concrete platform API lives behind this trait.

use async_trait::async_trait;

use crate::domain::{NodeSpec, ResourceId, ResourceInfo, ResourcePatch};
use crate::error::Result;

#[async_trait]
pub trait ComputePlatform: Send + Sync {
    /// Create a resource for `spec`, returning its identifier.
    ///
    /// A resource that already exists under the same name fails with
    /// [`InfraError::ResourceConflict`](crate::error::InfraError::ResourceConflict)
    /// carrying the existing identifier.
    async fn create(&self, spec: &NodeSpec) -> Result<ResourceId>;

    /// Start the resource. Starting a running resource is a no-op.
    async fn start(&self, id: &ResourceId) -> Result<()>;

    /// Current platform view of the resource.
    ///
    /// An unknown identifier fails with
    /// [`InfraError::NotFound`](crate::error::InfraError::NotFound).
    async fn status(&self, id: &ResourceId) -> Result<ResourceInfo>;

    /// Apply a non-disruptive resize.
    async fn resize(&self, id: &ResourceId, patch: &ResourcePatch) -> Result<()>;

    /// Delete the resource. Deleting an absent resource is a no-op.
    async fn delete(&self, id: &ResourceId) -> Result<()>;
}
