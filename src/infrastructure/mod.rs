//! Infrastructure layer.
//!
//! Technical concerns that support the application without containing
//! deployment logic.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for adapter wiring
//! - [`config`] - Configuration loading and validation
//! - [`operator`] - Inbound operator backed by the composition root

pub mod bootstrap;
pub mod config;
pub mod operator;
