//! Table-backed name resolver.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::port::outbound::resolver::NameResolver;

/// Resolves names from a fixed table; unknown names fail transiently.
#[derive(Default)]
pub struct StaticResolver {
    hosts: BTreeMap<String, String>,
    lookups: Mutex<Vec<String>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.hosts.insert(name.into(), address.into());
        self
    }

    /// Names looked up so far, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl NameResolver for StaticResolver {
    async fn resolve(&self, name: &str) -> Result<String> {
        self.lookups.lock().push(name.to_string());
        self.hosts
            .get(name)
            .cloned()
            .ok_or_else(|| Error::transient(format!("no address for {name}")))
    }
}
