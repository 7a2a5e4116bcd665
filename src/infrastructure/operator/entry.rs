//! Concrete operator entry point.

/// Production operator wiring configuration into the orchestrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Operator;

impl Operator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}
