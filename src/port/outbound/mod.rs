//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe infrastructure dependencies: the compute
//! platform, the remote command channel, name resolution, the cluster
//! runtime and local persistence.

pub mod platform;
pub mod remote;
pub mod resolver;
pub mod runtime;
pub mod store;
