//! Deployment orchestration.
//!
//! - [`orchestrator`]: Phase driver and single writer of deployment state
//! - [`report`]: Per-node and fleet-level run reports

pub mod orchestrator;
pub mod report;
