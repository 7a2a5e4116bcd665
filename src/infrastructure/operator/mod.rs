//! Operator implementations for inbound adapters.

pub mod entry;
pub mod fleet;
