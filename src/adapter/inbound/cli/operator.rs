//! Inbound operator accessor for CLI handlers.

use std::path::Path;
use std::sync::OnceLock;

use crate::error::{ConfigError, Result};
use crate::port::inbound::operator::FleetOperator;

static OPERATOR: OnceLock<Box<dyn FleetOperator>> = OnceLock::new();

/// Installs the operator implementation used by CLI handlers.
pub fn install(
    operator: Box<dyn FleetOperator>,
) -> std::result::Result<(), Box<dyn FleetOperator>> {
    OPERATOR.set(operator)
}

/// Returns the configured operator for CLI handlers.
#[must_use]
pub fn operator() -> &'static dyn FleetOperator {
    OPERATOR
        .get()
        .expect("CLI operator not installed; call cli::operator::install from main")
        .as_ref()
}

/// Load config TOML from disk for operator-facing use-cases.
pub fn read_config_toml(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|err| ConfigError::ReadFile(format!("{}: {err}", path.display())).into())
}
