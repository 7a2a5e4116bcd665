//! Cluster formation services.
//!
//! - [`coordinator`]: Exactly-once control-plane bootstrap and joining
//! - [`procedure`]: Cluster runtime driven by remote procedures

pub mod coordinator;
pub mod procedure;
