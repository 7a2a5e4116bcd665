//! Node name resolution.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::net::lookup_host;
use tracing::debug;

use crate::error::{Error, Result};
use crate::port::outbound::resolver::NameResolver;

/// Static overrides first, then the system resolver.
#[derive(Debug, Clone, Default)]
pub struct DnsResolver {
    overrides: BTreeMap<String, String>,
}

impl DnsResolver {
    pub fn new(overrides: BTreeMap<String, String>) -> Self {
        Self { overrides }
    }

    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), address.into());
        self
    }
}

#[async_trait]
impl NameResolver for DnsResolver {
    async fn resolve(&self, name: &str) -> Result<String> {
        if let Some(address) = self.overrides.get(name) {
            return Ok(address.clone());
        }

        // A freshly booted node may not be in DNS yet.
        let mut addrs = lookup_host((name, 0))
            .await
            .map_err(|err| Error::transient(format!("cannot resolve {name}: {err}")))?;
        let address = addrs
            .next()
            .map(|addr| addr.ip().to_string())
            .ok_or_else(|| Error::transient(format!("no address for {name}")))?;
        debug!(node = name, address = %address, "Resolved node address");
        Ok(address)
    }
}
