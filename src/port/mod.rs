//! Trait definitions (hexagonal ports).
//!
//! Ports are the narrow contracts through which the orchestration core talks
//! to collaborators it does not own.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!                    │                         │
//!     ┌──────────────┤  Domain + Port          ├──────────────┐
//!     │              │                         │              │
//!     │              └─────────────────────────┘              │
//!     │                  │             │                      │
//!     ▼                  ▼             ▼                      ▼
//! ┌──────────┐     ┌──────────┐  ┌──────────┐          ┌───────────┐
//! │ Platform │     │  Remote  │  │  Store   │          │  Cluster  │
//! │ Adapter  │     │ Channel  │  │ Adapter  │          │  Runtime  │
//! └──────────┘     └──────────┘  └──────────┘          └───────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`outbound::platform::ComputePlatform`] - create, start, status, resize, delete
//! - [`outbound::remote::RemoteChannel`] - remote command execution
//! - [`outbound::resolver::NameResolver`] - node name to address
//! - [`outbound::runtime::ClusterRuntime`] - membership, bootstrap, join, readiness
//! - [`outbound::store::StateStore`], [`outbound::store::TokenStore`] - persistence
//! - [`inbound::operator::FleetOperator`] - deploy, status, destroy for inbound adapters

pub mod inbound;
pub mod outbound;
