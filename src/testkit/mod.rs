//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`platform`]: `FakePlatform`, an in-memory compute platform.
//! - [`remote`]: `FakeChannel`, a scripted remote command channel.
//! - [`runtime`]: `FakeRuntime`, counting bootstrap and join calls.
//! - [`store`]: In-memory state and token stores.
//! - [`observer`]: `ConcurrencyProbe` for executor parallelism.
//! - [`resolver`]: `StaticResolver`, a fixed name table.
//! - [`harness`]: An orchestrator wired to all of the above.
//! - [`config`]: Canonical fleets, policies and config files.

pub mod config;
pub mod harness;
pub mod observer;
pub mod platform;
pub mod remote;
pub mod resolver;
pub mod runtime;
pub mod store;
