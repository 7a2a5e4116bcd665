//! Outbound adapters (driven side).

pub mod file_store;
pub mod platform;
pub mod resolver;
pub mod ssh;
