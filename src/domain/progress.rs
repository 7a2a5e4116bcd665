//! Progress events emitted for presentation only.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::job::Phase;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// Integer percentage within the phase, `0..=100`.
    pub percent: u8,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(phase: Phase, percent: u8) -> Self {
        Self {
            phase,
            percent: percent.min(100),
            timestamp: Utc::now(),
        }
    }
}

/// Integer percentage of `done` out of `total`. An empty phase is complete.
#[must_use]
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}
