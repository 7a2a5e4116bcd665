//! Name resolution port.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Resolve a node name to a network address, or fail.
    async fn resolve(&self, name: &str) -> Result<String>;
}
