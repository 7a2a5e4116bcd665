//! Fleetform - idempotent fleet provisioning and cluster formation.
//!
//! Provisions a fleet of compute nodes, forms a cluster on them exactly once,
//! installs the node procedures and verifies health. Every command is safe
//! to re-run: existing resources are adopted, never duplicated.
//!
//! # Architecture
//!
//! Hexagonal layout:
//!
//! - [`domain`] - Fleet, state, jobs, tokens and health. No I/O.
//! - [`port`] - Traits for the platform, remote channel, resolver, runtime and stores
//! - [`application`] - Provisioner, executor, installer, formation, health, orchestrator
//! - [`adapter`] - CLI (inbound); HTTP platform, ssh, DNS, file stores (outbound)
//! - [`infrastructure`] - Configuration, logging and wiring
//!
//! # Example
//!
//! ```no_run
//! use fleetform::infrastructure::bootstrap::build_orchestrator;
//! use fleetform::infrastructure::config::settings::Config;
//! use fleetform::port::inbound::operator::Overrides;
//!
//! # async fn run() -> fleetform::error::Result<()> {
//! let config = Config::load("fleet.toml")?;
//! let orchestrator = build_orchestrator(&config, Overrides::default())?;
//! let report = orchestrator.deploy().await?;
//! println!("health: {:?}", report.health);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
