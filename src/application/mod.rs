//! Application services (use cases).
//!
//! These services drive the outbound ports to provision a fleet, form the
//! cluster exactly once and verify its health.

pub mod cluster;
pub mod executor;
pub mod health;
pub mod installer;
pub mod orchestration;
pub mod progress;
pub mod provision;
pub mod retry;
